use crate::domain::{BlockKind, ClockRange, DayEntry, SuggestedSlots, TimeRange};
use crate::time_codec::{Minutes, parse_strict, snap};
use crate::timeline::TimelineWindow;

/// The three renderable ranges, ordered and non-overlapping once produced by
/// [`effective_ranges`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRanges {
    pub morning: TimeRange,
    pub midday: TimeRange,
    pub activity: TimeRange,
}

impl BlockRanges {
    pub fn get(&self, kind: BlockKind) -> TimeRange {
        match kind {
            BlockKind::Morning => self.morning,
            BlockKind::Midday => self.midday,
            BlockKind::Activity => self.activity,
        }
    }

    pub fn set(&mut self, kind: BlockKind, range: TimeRange) {
        match kind {
            BlockKind::Morning => self.morning = range,
            BlockKind::Midday => self.midday = range,
            BlockKind::Activity => self.activity = range,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlockKind, TimeRange)> + '_ {
        BlockKind::ALL
            .into_iter()
            .map(move |kind| (kind, self.get(kind)))
    }

    pub fn is_ordered(&self) -> bool {
        self.morning.end <= self.midday.start && self.midday.end <= self.activity.start
    }
}

pub fn min_duration(kind: BlockKind) -> Minutes {
    match kind {
        BlockKind::Morning | BlockKind::Midday => 45,
        BlockKind::Activity => 30,
    }
}

fn default_offset(kind: BlockKind) -> f64 {
    match kind {
        BlockKind::Morning => 0.15,
        BlockKind::Midday => 0.45,
        BlockKind::Activity => 0.75,
    }
}

/// A fallback range placed proportionally into the visible window.
pub fn synthesized_default(kind: BlockKind, window: &TimelineWindow) -> TimeRange {
    let span = window.span();
    let duration = min_duration(kind);
    let offset = snap((f64::from(span) * default_offset(kind)).round() as Minutes);
    let latest_start = (window.max_minute() - duration).max(window.min_minute());
    let start = (window.min_minute() + offset).min(latest_start);
    TimeRange::new(start, start + duration)
}

fn valid_range(start: Option<&str>, end: Option<&str>) -> Option<TimeRange> {
    let start = parse_strict(start?)?;
    let end = parse_strict(end?)?;
    (end > start).then_some(TimeRange::new(start, end))
}

fn resolve_block(
    kind: BlockKind,
    entry: &DayEntry,
    suggested: Option<&SuggestedSlots>,
    window: &TimelineWindow,
) -> TimeRange {
    let (actual_start, actual_end) = entry.actual(kind);
    valid_range(actual_start, actual_end)
        .or_else(|| {
            let slot = suggested?.get(kind)?;
            valid_range(Some(&slot.start), Some(&slot.end))
        })
        .unwrap_or_else(|| synthesized_default(kind, window))
}

/// Resolves actual, then suggested, then synthesized ranges for every block
/// and pushes later blocks forward until the three are in order.
pub fn effective_ranges(
    entry: &DayEntry,
    suggested: Option<&SuggestedSlots>,
    window: &TimelineWindow,
) -> BlockRanges {
    let mut ranges = BlockRanges {
        morning: resolve_block(BlockKind::Morning, entry, suggested, window),
        midday: resolve_block(BlockKind::Midday, entry, suggested, window),
        activity: resolve_block(BlockKind::Activity, entry, suggested, window),
    };

    for kind in [BlockKind::Midday, BlockKind::Activity] {
        let Some(previous) = kind.previous() else {
            continue;
        };
        let floor = ranges.get(previous).end;
        let mut range = ranges.get(kind);
        if range.start < floor {
            range.start = floor;
            if range.end - range.start < min_duration(kind) {
                range.end = range.start + min_duration(kind);
            }
        }
        ranges.set(kind, range);
    }

    ranges
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Variance {
    pub start_delta: Option<Minutes>,
    pub duration_delta: Option<Minutes>,
}

fn midpoint(range: &ClockRange) -> Option<Minutes> {
    let start = parse_strict(&range.start)?;
    let end = parse_strict(&range.end)?;
    Some((f64::from(start + end) / 2.0).round() as Minutes)
}

fn duration(range: &ClockRange) -> Option<Minutes> {
    let start = parse_strict(&range.start)?;
    let end = parse_strict(&range.end)?;
    Some((end - start).max(0))
}

/// How far the actual block drifted from its suggestion, in minutes.
pub fn variance_minutes(suggested: Option<&ClockRange>, actual: Option<&ClockRange>) -> Variance {
    let (Some(suggested), Some(actual)) = (suggested, actual) else {
        return Variance::default();
    };

    let start_delta = midpoint(suggested)
        .zip(midpoint(actual))
        .map(|(planned, real)| (real - planned).abs());
    let duration_delta = duration(suggested)
        .zip(duration(actual))
        .map(|(planned, real)| (real - planned).abs());
    Variance {
        start_delta,
        duration_delta,
    }
}
