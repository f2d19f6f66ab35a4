/// Minutes since local midnight.
pub type Minutes = i32;

pub const SNAP_MINUTES: Minutes = 15;
pub const DEFAULT_FALLBACK: &str = "08:00";

/// Parses `H:MM` or `HH:MM` into minutes. Anything else resolves to the
/// fallback; the hour is clamped to 0..=23 and the minute to 0..=59.
pub fn parse_time(text: Option<&str>, fallback: Option<&str>) -> Minutes {
    text.and_then(parse_strict)
        .or_else(|| parse_strict(fallback.unwrap_or(DEFAULT_FALLBACK)))
        .unwrap_or(8 * 60)
}

/// Same grammar as [`parse_time`] but without a fallback.
pub fn parse_strict(text: &str) -> Option<Minutes> {
    let (hours, minutes) = text.trim().split_once(':')?;
    let hour_ok = (1..=2).contains(&hours.len()) && hours.bytes().all(|b| b.is_ascii_digit());
    let minute_ok = minutes.len() == 2 && minutes.bytes().all(|b| b.is_ascii_digit());
    if !hour_ok || !minute_ok {
        return None;
    }

    let hours = hours.parse::<Minutes>().ok()?.clamp(0, 23);
    let minutes = minutes.parse::<Minutes>().ok()?.clamp(0, 59);
    Some(hours * 60 + minutes)
}

pub fn format_time(minutes: Minutes) -> String {
    let hours = minutes.div_euclid(60).clamp(0, 23);
    let rest = minutes.rem_euclid(60);
    let rest = if minutes < 0 { 0 } else { rest.clamp(0, 59) };
    format!("{hours:02}:{rest:02}")
}

/// Rounds to the nearest 15-minute boundary.
pub fn snap(minutes: Minutes) -> Minutes {
    let step = f64::from(SNAP_MINUTES);
    ((f64::from(minutes) / step).round() * step) as Minutes
}

#[cfg(test)]
mod tests {
    use super::{format_time, parse_strict, parse_time, snap};

    #[test]
    fn parses_clock_strings() {
        assert_eq!(parse_time(Some("00:00"), None), 0);
        assert_eq!(parse_time(Some("0:00"), None), 0);
        assert_eq!(parse_time(Some("01:30"), None), 90);
        assert_eq!(parse_time(Some("23:59"), None), 23 * 60 + 59);
        assert_eq!(parse_time(Some(" 7:05 "), None), 7 * 60 + 5);
    }

    #[test]
    fn clamps_out_of_range_components() {
        assert_eq!(parse_time(Some("29:00"), None), 23 * 60);
        assert_eq!(parse_time(Some("10:75"), None), 10 * 60 + 59);
    }

    #[test]
    fn malformed_input_uses_fallback() {
        assert_eq!(parse_time(None, None), 480);
        assert_eq!(parse_time(Some("garbage"), None), 480);
        assert_eq!(parse_time(Some("123:00"), None), 480);
        assert_eq!(parse_time(Some("8:5"), None), 480);
        assert_eq!(parse_time(None, Some("13:00")), 780);
        assert_eq!(parse_time(Some(""), Some("17:30")), 1050);
        assert_eq!(parse_time(Some("bad"), Some("13:00")), 780);
        assert_eq!(parse_time(None, Some("nope")), 480);
        assert_eq!(parse_strict("nope"), None);
    }

    #[test]
    fn formats_with_zero_padding_and_floor() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(90), "01:30");
        assert_eq!(format_time(23 * 60 + 59), "23:59");
        assert_eq!(format_time(-10), "00:00");
        assert_eq!(format_time(-30), "00:00");
        assert_eq!(format_time(24 * 60 + 30), "23:30");
    }

    #[test]
    fn every_minute_of_the_day_survives_format_then_parse() {
        for minute in 0..24 * 60 {
            assert_eq!(parse_time(Some(&format_time(minute)), None), minute);
        }
    }

    #[test]
    fn snaps_to_quarter_hours() {
        assert_eq!(snap(487), 480);
        assert_eq!(snap(488), 495);
        assert_eq!(snap(502), 495);
        assert_eq!(snap(0), 0);
    }
}
