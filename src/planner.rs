use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{
    BlockKind, DEFAULT_ACTIVITY_COLOR, Day, DayEntry, DayPatch, ObjectiveCount, Settings,
    WeekRecord, count_objectives, start_of_week_monday, week_dates,
};
use crate::storage::WeekPayload;
use crate::templates::{
    ApplyOptions, CaptureOptions, Template, apply_template_to_week, capture_week_as_template,
};
use crate::time_codec::Minutes;
use crate::timeline::{TimelineProps, TimelineWindow, nudge_patch};

/// Owns the week being edited and the settings it is edited against. Editors
/// only ever see one day and hand back patches.
#[derive(Debug, Clone)]
pub struct Planner {
    week_start: NaiveDate,
    week: WeekRecord,
    settings: Settings,
    window: TimelineWindow,
    prevent_overlap: bool,
}

impl Planner {
    pub fn new(
        week_start: NaiveDate,
        week: WeekRecord,
        settings: Settings,
        window: TimelineWindow,
        prevent_overlap: bool,
    ) -> Self {
        Self {
            week_start: start_of_week_monday(week_start),
            week,
            settings,
            window,
            prevent_overlap,
        }
    }

    pub fn week_start(&self) -> NaiveDate {
        self.week_start
    }

    pub fn week(&self) -> &WeekRecord {
        &self.week
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn window(&self) -> TimelineWindow {
        self.window
    }

    pub fn prevent_overlap(&self) -> bool {
        self.prevent_overlap
    }

    pub fn entry(&self, day: Day) -> &DayEntry {
        self.week.day(day)
    }

    pub fn date_of(&self, day: Day) -> NaiveDate {
        self.week_start + Duration::days(day.index() as i64)
    }

    pub fn day_of(&self, date: NaiveDate) -> Option<Day> {
        week_dates(self.week_start)
            .into_iter()
            .find(|(_, candidate)| *candidate == date)
            .map(|(day, _)| day)
    }

    pub fn objectives(&self, day: Day) -> ObjectiveCount {
        count_objectives(Some(self.entry(day)))
    }

    pub fn timeline_props(&self, day: Day, active: Option<BlockKind>) -> TimelineProps<'_> {
        TimelineProps {
            entry: self.entry(day),
            suggested: Some(&self.settings.suggested_slots),
            window: self.window,
            active,
            prevent_overlap: self.prevent_overlap,
        }
    }

    /// Swaps in another week, e.g. after navigation or import.
    pub fn replace_week(&mut self, week_start: NaiveDate, week: WeekRecord) {
        self.week_start = start_of_week_monday(week_start);
        self.week = week;
    }

    pub fn replace_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    /// Shallow merge; returns whether the day changed.
    pub fn apply_patch(&mut self, day: Day, patch: &DayPatch) -> bool {
        let before = self.week.day(day).clone();
        self.week.day_mut(day).apply(patch);
        let changed = *self.week.day(day) != before;
        if changed {
            debug!(%day, "applied day patch");
        }
        changed
    }

    /// Carries out a nudge request with the same rules as a drag.
    pub fn apply_nudge(&mut self, day: Day, block: BlockKind, delta: Minutes) -> Option<DayPatch> {
        let patch = nudge_patch(block, delta, &self.timeline_props(day, Some(block)))?;
        self.apply_patch(day, &patch);
        Some(patch)
    }

    /// Adds a custom activity to the global list; returns whether it was new.
    pub fn ensure_activity(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || self.settings.activity_colors.contains_key(name) {
            return false;
        }
        self.settings
            .activity_colors
            .insert(name.to_string(), DEFAULT_ACTIVITY_COLOR.to_string());
        info!(activity = name, "added activity");
        true
    }

    /// No block on any day has a label yet.
    pub fn has_no_labels(&self) -> bool {
        self.week.iter().all(|(_, entry)| {
            BlockKind::ALL
                .into_iter()
                .all(|kind| entry.label(kind).trim().is_empty())
        })
    }

    /// Puts the first project and first activity into every empty label slot.
    pub fn fill_blanks_with_defaults(&mut self) -> bool {
        let project = self.settings.projects.first().cloned();
        let activity = self.settings.activities().into_iter().next();
        let mut changed = false;

        for day in Day::ALL {
            let entry = self.week.day_mut(day);
            if let Some(project) = &project {
                for slot in [&mut entry.morning_project, &mut entry.midday_project] {
                    if slot.trim().is_empty() {
                        *slot = project.clone();
                        changed = true;
                    }
                }
            }
            if let Some(activity) = &activity {
                if entry.activity.trim().is_empty() {
                    entry.activity = activity.clone();
                    changed = true;
                }
            }
        }
        changed
    }

    pub fn capture_template(&mut self, options: &CaptureOptions) -> Template {
        let template = capture_week_as_template(&self.week, options);
        self.settings.templates.push(template.clone());
        template
    }

    pub fn apply_template(&mut self, id: &str, options: ApplyOptions) -> Option<&Template> {
        let template = self.settings.templates.iter().find(|template| template.id == id)?;
        self.week = apply_template_to_week(&self.week, template, options);
        Some(template)
    }

    pub fn weekly_completion(&self) -> f64 {
        weekly_completion(&self.week)
    }

    pub fn payload(&self, updated_at: DateTime<Utc>) -> WeekPayload {
        WeekPayload {
            week_start_iso: self.week_start,
            week: self.week.clone(),
            updated_at,
        }
    }
}

pub fn is_full_day(entry: &DayEntry) -> bool {
    BlockKind::ALL.into_iter().all(|kind| entry.done(kind))
}

/// Share of the seven days with every block done.
pub fn weekly_completion(week: &WeekRecord) -> f64 {
    let full = week.iter().filter(|(_, entry)| is_full_day(entry)).count();
    full as f64 / Day::ALL.len() as f64
}

/// Dates with every block done, across all weeks seen so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Progress {
    pub counted_days: BTreeSet<NaiveDate>,
    pub best_streak: u32,
}

impl Progress {
    /// Re-counts the seven dates of one week and bumps the best streak.
    pub fn update_from_week(&mut self, week_start: NaiveDate, week: &WeekRecord, today: NaiveDate) {
        for (day, date) in week_dates(week_start) {
            if is_full_day(week.day(day)) {
                self.counted_days.insert(date);
            } else {
                self.counted_days.remove(&date);
            }
        }
        let streak = self.current_streak(today);
        if streak > self.best_streak {
            self.best_streak = streak;
        }
    }

    /// Consecutive counted days ending today.
    pub fn current_streak(&self, today: NaiveDate) -> u32 {
        let mut streak = 0;
        let mut date = today;
        while self.counted_days.contains(&date) {
            streak += 1;
            let Some(previous) = date.pred_opt() else {
                break;
            };
            date = previous;
        }
        streak
    }
}
