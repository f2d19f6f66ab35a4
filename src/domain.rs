use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use serde::{Deserialize, Deserializer, Serialize};

use crate::templates::Template;
use crate::time_codec::Minutes;

const ID_LEN: usize = 6;
pub const OBJECTIVES_PER_DAY: u32 = 3;
pub const DEFAULT_ACTIVITY_COLOR: &str = "#888";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Day {
    pub const ALL: [Day; 7] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
        Day::Sunday,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
            Day::Sunday => "Sunday",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_weekend(self) -> bool {
        matches!(self, Day::Saturday | Day::Sunday)
    }

    pub fn from_weekday(weekday: Weekday) -> Self {
        Day::ALL[weekday.num_days_from_monday() as usize]
    }
}

impl Display for Day {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Day {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let needle = raw.trim().to_ascii_lowercase();
        if needle.len() < 2 {
            return Err(format!("unknown day: {raw}"));
        }
        Day::ALL
            .into_iter()
            .find(|day| day.name().to_ascii_lowercase().starts_with(&needle))
            .ok_or_else(|| format!("unknown day: {raw}"))
    }
}

/// The three daily blocks, in chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Morning,
    Midday,
    Activity,
}

impl BlockKind {
    pub const ALL: [BlockKind; 3] = [BlockKind::Morning, BlockKind::Midday, BlockKind::Activity];

    pub fn label(self) -> &'static str {
        match self {
            BlockKind::Morning => "Morning",
            BlockKind::Midday => "Midday",
            BlockKind::Activity => "Activity",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            BlockKind::Morning => "Morning Work",
            BlockKind::Midday => "Midday Work",
            BlockKind::Activity => "Activity",
        }
    }

    pub fn next(self) -> Self {
        match self {
            BlockKind::Morning => BlockKind::Midday,
            BlockKind::Midday => BlockKind::Activity,
            BlockKind::Activity => BlockKind::Morning,
        }
    }

    pub fn previous(self) -> Option<Self> {
        match self {
            BlockKind::Morning => None,
            BlockKind::Midday => Some(BlockKind::Morning),
            BlockKind::Activity => Some(BlockKind::Midday),
        }
    }

    pub fn following(self) -> Option<Self> {
        match self {
            BlockKind::Morning => Some(BlockKind::Midday),
            BlockKind::Midday => Some(BlockKind::Activity),
            BlockKind::Activity => None,
        }
    }
}

impl Display for BlockKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BlockKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "morning" | "am" => Ok(BlockKind::Morning),
            "midday" | "mid" => Ok(BlockKind::Midday),
            "activity" | "act" => Ok(BlockKind::Activity),
            _ => Err(format!("unknown block: {raw}")),
        }
    }
}

/// A numeric range; `end > start` is only guaranteed after reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Minutes,
    pub end: Minutes,
}

impl TimeRange {
    pub fn new(start: Minutes, end: Minutes) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Minutes {
        self.end - self.start
    }
}

/// Wire form of a range, as stored in settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockRange {
    pub start: String,
    pub end: String,
}

impl ClockRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedSlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub morning: Option<ClockRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub midday: Option<ClockRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<ClockRange>,
}

impl SuggestedSlots {
    pub fn get(&self, kind: BlockKind) -> Option<&ClockRange> {
        match kind {
            BlockKind::Morning => self.morning.as_ref(),
            BlockKind::Midday => self.midday.as_ref(),
            BlockKind::Activity => self.activity.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DayEntry {
    pub morning_project: String,
    pub midday_project: String,
    pub activity: String,
    pub done_morning: bool,
    pub done_midday: bool,
    pub done_activity: bool,
    pub morning_notes: String,
    pub midday_notes: String,
    pub activity_notes: String,
    pub gratitude: String,
    pub notes: String,
    pub mood: Option<u8>,
    pub therapy: bool,
    pub morning_actual_start: String,
    pub morning_actual_end: String,
    pub midday_actual_start: String,
    pub midday_actual_end: String,
    pub activity_actual_start: String,
    pub activity_actual_end: String,
}

impl DayEntry {
    pub fn label(&self, kind: BlockKind) -> &str {
        match kind {
            BlockKind::Morning => &self.morning_project,
            BlockKind::Midday => &self.midday_project,
            BlockKind::Activity => &self.activity,
        }
    }

    pub fn done(&self, kind: BlockKind) -> bool {
        match kind {
            BlockKind::Morning => self.done_morning,
            BlockKind::Midday => self.done_midday,
            BlockKind::Activity => self.done_activity,
        }
    }

    pub fn block_notes(&self, kind: BlockKind) -> &str {
        match kind {
            BlockKind::Morning => &self.morning_notes,
            BlockKind::Midday => &self.midday_notes,
            BlockKind::Activity => &self.activity_notes,
        }
    }

    /// Actual start/end strings; blank means absent.
    pub fn actual(&self, kind: BlockKind) -> (Option<&str>, Option<&str>) {
        let (start, end) = match kind {
            BlockKind::Morning => (&self.morning_actual_start, &self.morning_actual_end),
            BlockKind::Midday => (&self.midday_actual_start, &self.midday_actual_end),
            BlockKind::Activity => (&self.activity_actual_start, &self.activity_actual_end),
        };
        (non_blank(start), non_blank(end))
    }

    pub fn apply(&mut self, patch: &DayPatch) {
        patch.merge_into(self, true);
    }
}

fn non_blank(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Partial update of a [`DayEntry`]; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DayPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub morning_project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub midday_project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done_morning: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done_midday: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done_activity: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub morning_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub midday_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gratitude: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// `Some(None)` clears the mood.
    #[serde(
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub mood: Option<Option<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub therapy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub morning_actual_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub morning_actual_end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub midday_actual_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub midday_actual_end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_actual_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_actual_end: Option<String>,
}

fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl DayPatch {
    pub fn times(kind: BlockKind, start: impl Into<String>, end: impl Into<String>) -> Self {
        let mut patch = Self::default();
        *patch.start_slot(kind) = Some(start.into());
        *patch.end_slot(kind) = Some(end.into());
        patch
    }

    pub fn start(kind: BlockKind, start: impl Into<String>) -> Self {
        let mut patch = Self::default();
        *patch.start_slot(kind) = Some(start.into());
        patch
    }

    pub fn end(kind: BlockKind, end: impl Into<String>) -> Self {
        let mut patch = Self::default();
        *patch.end_slot(kind) = Some(end.into());
        patch
    }

    pub fn label(kind: BlockKind, label: impl Into<String>) -> Self {
        let mut patch = Self::default();
        match kind {
            BlockKind::Morning => patch.morning_project = Some(label.into()),
            BlockKind::Midday => patch.midday_project = Some(label.into()),
            BlockKind::Activity => patch.activity = Some(label.into()),
        }
        patch
    }

    pub fn done(kind: BlockKind, done: bool) -> Self {
        let mut patch = Self::default();
        match kind {
            BlockKind::Morning => patch.done_morning = Some(done),
            BlockKind::Midday => patch.done_midday = Some(done),
            BlockKind::Activity => patch.done_activity = Some(done),
        }
        patch
    }

    pub fn block_notes(kind: BlockKind, notes: impl Into<String>) -> Self {
        let mut patch = Self::default();
        match kind {
            BlockKind::Morning => patch.morning_notes = Some(notes.into()),
            BlockKind::Midday => patch.midday_notes = Some(notes.into()),
            BlockKind::Activity => patch.activity_notes = Some(notes.into()),
        }
        patch
    }

    fn start_slot(&mut self, kind: BlockKind) -> &mut Option<String> {
        match kind {
            BlockKind::Morning => &mut self.morning_actual_start,
            BlockKind::Midday => &mut self.midday_actual_start,
            BlockKind::Activity => &mut self.activity_actual_start,
        }
    }

    fn end_slot(&mut self, kind: BlockKind) -> &mut Option<String> {
        match kind {
            BlockKind::Morning => &mut self.morning_actual_end,
            BlockKind::Midday => &mut self.midday_actual_end,
            BlockKind::Activity => &mut self.activity_actual_end,
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &DayPatch::default()
    }

    /// Writes every present field. With `overwrite == false` a field is only
    /// written when the target is blank: an empty or whitespace-only string,
    /// or an absent mood. Booleans always hold a value and are never filled.
    pub fn merge_into(&self, entry: &mut DayEntry, overwrite: bool) {
        merge_text(&mut entry.morning_project, &self.morning_project, overwrite);
        merge_text(&mut entry.midday_project, &self.midday_project, overwrite);
        merge_text(&mut entry.activity, &self.activity, overwrite);
        merge_flag(&mut entry.done_morning, self.done_morning, overwrite);
        merge_flag(&mut entry.done_midday, self.done_midday, overwrite);
        merge_flag(&mut entry.done_activity, self.done_activity, overwrite);
        merge_text(&mut entry.morning_notes, &self.morning_notes, overwrite);
        merge_text(&mut entry.midday_notes, &self.midday_notes, overwrite);
        merge_text(&mut entry.activity_notes, &self.activity_notes, overwrite);
        merge_text(&mut entry.gratitude, &self.gratitude, overwrite);
        merge_text(&mut entry.notes, &self.notes, overwrite);
        if let Some(mood) = self.mood {
            if overwrite || entry.mood.is_none() {
                entry.mood = mood.map(|value| value.clamp(1, 5));
            }
        }
        merge_flag(&mut entry.therapy, self.therapy, overwrite);
        merge_text(&mut entry.morning_actual_start, &self.morning_actual_start, overwrite);
        merge_text(&mut entry.morning_actual_end, &self.morning_actual_end, overwrite);
        merge_text(&mut entry.midday_actual_start, &self.midday_actual_start, overwrite);
        merge_text(&mut entry.midday_actual_end, &self.midday_actual_end, overwrite);
        merge_text(&mut entry.activity_actual_start, &self.activity_actual_start, overwrite);
        merge_text(&mut entry.activity_actual_end, &self.activity_actual_end, overwrite);
    }
}

fn merge_text(target: &mut String, value: &Option<String>, overwrite: bool) {
    if let Some(value) = value {
        if overwrite || target.trim().is_empty() {
            target.clone_from(value);
        }
    }
}

fn merge_flag(target: &mut bool, value: Option<bool>, overwrite: bool) {
    if let Some(value) = value {
        if overwrite {
            *target = value;
        }
    }
}

/// All seven days, always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Day, DayEntry>", into = "BTreeMap<Day, DayEntry>")]
pub struct WeekRecord {
    days: [DayEntry; 7],
}

impl WeekRecord {
    pub fn empty() -> Self {
        Self {
            days: Default::default(),
        }
    }

    pub fn day(&self, day: Day) -> &DayEntry {
        &self.days[day.index()]
    }

    pub fn day_mut(&mut self, day: Day) -> &mut DayEntry {
        &mut self.days[day.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Day, &DayEntry)> {
        Day::ALL.into_iter().zip(self.days.iter())
    }
}

impl Default for WeekRecord {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<BTreeMap<Day, DayEntry>> for WeekRecord {
    fn from(mut map: BTreeMap<Day, DayEntry>) -> Self {
        let mut week = WeekRecord::empty();
        for day in Day::ALL {
            if let Some(entry) = map.remove(&day) {
                *week.day_mut(day) = entry;
            }
        }
        week
    }
}

impl From<WeekRecord> for BTreeMap<Day, DayEntry> {
    fn from(week: WeekRecord) -> Self {
        Day::ALL.into_iter().zip(week.days).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub projects: Vec<String>,
    pub activity_colors: BTreeMap<String, String>,
    pub project_emojis: BTreeMap<String, String>,
    pub activity_emojis: BTreeMap<String, String>,
    pub suggested_slots: SuggestedSlots,
    pub templates: Vec<Template>,
}

impl Default for Settings {
    fn default() -> Self {
        let pairs = |rows: &[(&str, &str)]| {
            rows.iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect::<BTreeMap<_, _>>()
        };

        Self {
            projects: ["Prototype 4-track", "Freelance UX", "Music Practice", "Linocut Book"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            activity_colors: pairs(&[
                ("Run", DEFAULT_ACTIVITY_COLOR),
                ("Yoga", DEFAULT_ACTIVITY_COLOR),
                ("Strength", DEFAULT_ACTIVITY_COLOR),
            ]),
            project_emojis: pairs(&[
                ("Prototype 4-track", "🧪"),
                ("Freelance UX", "💼"),
                ("Music Practice", "🎸"),
                ("Linocut Book", "📗"),
            ]),
            activity_emojis: pairs(&[("Run", "🏃"), ("Yoga", "🧘"), ("Strength", "🏋️")]),
            suggested_slots: SuggestedSlots {
                morning: Some(ClockRange::new("08:00", "10:00")),
                midday: Some(ClockRange::new("13:00", "15:00")),
                activity: Some(ClockRange::new("17:00", "18:00")),
            },
            templates: Vec::new(),
        }
    }
}

impl Settings {
    /// Fills anything the stored document left out from the defaults. Stored
    /// map entries win over default ones.
    pub fn with_defaults(mut self) -> Self {
        let defaults = Settings::default();
        if self.projects.is_empty() {
            self.projects = defaults.projects;
        }
        for (target, source) in [
            (&mut self.activity_colors, defaults.activity_colors),
            (&mut self.project_emojis, defaults.project_emojis),
            (&mut self.activity_emojis, defaults.activity_emojis),
        ] {
            for (key, value) in source {
                target.entry(key).or_insert(value);
            }
        }
        let slots = &mut self.suggested_slots;
        if slots.morning.is_none() {
            slots.morning = defaults.suggested_slots.morning;
        }
        if slots.midday.is_none() {
            slots.midday = defaults.suggested_slots.midday;
        }
        if slots.activity.is_none() {
            slots.activity = defaults.suggested_slots.activity;
        }
        self
    }

    pub fn activities(&self) -> Vec<String> {
        self.activity_colors.keys().cloned().collect()
    }

    pub fn label_options(&self, kind: BlockKind) -> Vec<String> {
        match kind {
            BlockKind::Activity => self.activities(),
            BlockKind::Morning | BlockKind::Midday => self.projects.clone(),
        }
    }

    pub fn emoji_for(&self, kind: BlockKind, label: &str) -> Option<&str> {
        let map = match kind {
            BlockKind::Activity => &self.activity_emojis,
            BlockKind::Morning | BlockKind::Midday => &self.project_emojis,
        };
        map.get(label).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectiveCount {
    pub completed: u32,
    pub total: u32,
    pub pct: u32,
}

/// Always three objectives per day; labels do not affect the denominator.
pub fn count_objectives(entry: Option<&DayEntry>) -> ObjectiveCount {
    let total = OBJECTIVES_PER_DAY;
    let Some(entry) = entry else {
        return ObjectiveCount {
            completed: 0,
            total,
            pct: 0,
        };
    };

    let completed = BlockKind::ALL
        .into_iter()
        .filter(|kind| entry.done(*kind))
        .count() as u32;
    let pct = (f64::from(completed) / f64::from(total) * 100.0).round() as u32;
    ObjectiveCount {
        completed,
        total,
        pct,
    }
}

pub fn start_of_week_monday(day: NaiveDate) -> NaiveDate {
    day - Duration::days(day.weekday().num_days_from_monday().into())
}

pub fn week_dates(week_start: NaiveDate) -> [(Day, NaiveDate); 7] {
    let monday = start_of_week_monday(week_start);
    Day::ALL.map(|day| (day, monday + Duration::days(day.index() as i64)))
}

pub fn shift_week(week_start: NaiveDate, weeks: i64) -> NaiveDate {
    start_of_week_monday(week_start) + Duration::weeks(weeks)
}

pub fn generate_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect::<String>()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{
        BlockKind, Day, DayEntry, DayPatch, Settings, WeekRecord, count_objectives,
        start_of_week_monday, week_dates,
    };

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn counts_objectives_with_fixed_denominator() {
        let empty = count_objectives(None);
        assert_eq!((empty.completed, empty.total, empty.pct), (0, 3, 0));

        let mut entry = DayEntry {
            done_morning: true,
            done_activity: true,
            midday_project: "   ".to_string(),
            ..DayEntry::default()
        };
        let two = count_objectives(Some(&entry));
        assert_eq!((two.completed, two.total, two.pct), (2, 3, 67));

        entry.done_activity = false;
        assert_eq!(count_objectives(Some(&entry)).pct, 33);

        entry.done_midday = true;
        entry.done_activity = true;
        let all = count_objectives(Some(&entry));
        assert_eq!((all.completed, all.total, all.pct), (3, 3, 100));
    }

    #[test]
    fn patch_merges_only_present_fields() {
        let mut entry = DayEntry {
            morning_project: "Alpha".to_string(),
            gratitude: "sun".to_string(),
            ..DayEntry::default()
        };
        entry.apply(&DayPatch::times(BlockKind::Morning, "08:00", "09:30"));
        assert_eq!(entry.morning_project, "Alpha");
        assert_eq!(entry.gratitude, "sun");
        assert_eq!(entry.actual(BlockKind::Morning), (Some("08:00"), Some("09:30")));
        assert_eq!(entry.actual(BlockKind::Midday), (None, None));
    }

    #[test]
    fn patch_mood_distinguishes_clear_from_absent() {
        let clear: DayPatch = serde_json::from_str(r#"{"mood":null}"#).expect("valid json");
        assert_eq!(clear.mood, Some(None));
        let absent: DayPatch = serde_json::from_str("{}").expect("valid json");
        assert_eq!(absent.mood, None);

        let mut entry = DayEntry {
            mood: Some(4),
            ..DayEntry::default()
        };
        entry.apply(&absent);
        assert_eq!(entry.mood, Some(4));
        entry.apply(&clear);
        assert_eq!(entry.mood, None);
        entry.apply(&DayPatch {
            mood: Some(Some(9)),
            ..DayPatch::default()
        });
        assert_eq!(entry.mood, Some(5));
    }

    #[test]
    fn patch_serializes_only_changed_keys() {
        let patch = DayPatch::times(BlockKind::Midday, "13:00", "14:15");
        let json = serde_json::to_string(&patch).expect("serializable");
        assert_eq!(json, r#"{"middayActualStart":"13:00","middayActualEnd":"14:15"}"#);
    }

    #[test]
    fn week_record_always_has_seven_days() {
        let sparse: WeekRecord =
            serde_json::from_str(r#"{"Tuesday":{"activity":"Run"}}"#).expect("valid json");
        assert_eq!(sparse.iter().count(), 7);
        assert_eq!(sparse.day(Day::Tuesday).activity, "Run");
        assert_eq!(sparse.day(Day::Sunday), &DayEntry::default());

        let json = serde_json::to_value(&sparse).expect("serializable");
        assert_eq!(json.as_object().map(|map| map.len()), Some(7));
    }

    #[test]
    fn day_entry_reads_camel_case_documents() {
        let entry: DayEntry = serde_json::from_str(
            r#"{"morningProject":"Freelance UX","doneMorning":true,"mood":null,"morningActualStart":"08:15"}"#,
        )
        .expect("valid json");
        assert_eq!(entry.morning_project, "Freelance UX");
        assert!(entry.done(BlockKind::Morning));
        assert_eq!(entry.actual(BlockKind::Morning), (Some("08:15"), None));
    }

    #[test]
    fn normalizes_weeks_to_monday() {
        assert_eq!(start_of_week_monday(date(2025, 9, 7)), date(2025, 9, 1));
        assert_eq!(start_of_week_monday(date(2025, 9, 1)), date(2025, 9, 1));
        assert_eq!(start_of_week_monday(date(2025, 9, 3)), date(2025, 9, 1));

        let dates = week_dates(date(2025, 9, 4));
        assert_eq!(dates[0], (Day::Monday, date(2025, 9, 1)));
        assert_eq!(dates[6], (Day::Sunday, date(2025, 9, 7)));
    }

    #[test]
    fn parses_day_and_block_names() {
        assert_eq!("wed".parse::<Day>(), Ok(Day::Wednesday));
        assert_eq!("Saturday".parse::<Day>(), Ok(Day::Saturday));
        assert!("x".parse::<Day>().is_err());
        assert_eq!("MIDDAY".parse::<BlockKind>(), Ok(BlockKind::Midday));
    }

    #[test]
    fn settings_defaults_fill_missing_pieces() {
        let stored = Settings {
            projects: Vec::new(),
            activity_colors: [("Swim".to_string(), "#0af".to_string())].into(),
            ..Settings::default()
        };
        let merged = stored.with_defaults();
        assert_eq!(merged.projects.len(), 4);
        assert!(merged.activity_colors.contains_key("Swim"));
        assert!(merged.activity_colors.contains_key("Run"));
    }
}
