use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Day, DayEntry, DayPatch, WeekRecord, generate_id};

pub const DEFAULT_TEMPLATE_NAME: &str = "My Template";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateScope {
    #[default]
    Entire,
    Weekdays,
    Weekends,
}

impl TemplateScope {
    pub fn contains(self, day: Day) -> bool {
        match self {
            TemplateScope::Entire => true,
            TemplateScope::Weekdays => !day.is_weekend(),
            TemplateScope::Weekends => day.is_weekend(),
        }
    }
}

impl Display for TemplateScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TemplateScope::Entire => "entire",
            TemplateScope::Weekdays => "weekdays",
            TemplateScope::Weekends => "weekends",
        })
    }
}

impl FromStr for TemplateScope {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "entire" | "week" | "all" => Ok(TemplateScope::Entire),
            "weekdays" => Ok(TemplateScope::Weekdays),
            "weekends" => Ok(TemplateScope::Weekends),
            _ => Err(format!("unknown scope: {raw} (expected entire, weekdays or weekends)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub scope: TemplateScope,
    #[serde(default)]
    pub days: BTreeMap<Day, DayPatch>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub name: String,
    pub scope: TemplateScope,
    pub include_notes: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_TEMPLATE_NAME.to_string(),
            scope: TemplateScope::Entire,
            include_notes: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    pub overwrite: bool,
    pub scope: TemplateScope,
}

pub fn capture_week_as_template(week: &WeekRecord, options: &CaptureOptions) -> Template {
    let name = if options.name.trim().is_empty() {
        DEFAULT_TEMPLATE_NAME.to_string()
    } else {
        options.name.trim().to_string()
    };

    let days = week
        .iter()
        .filter(|(day, _)| options.scope.contains(*day))
        .map(|(day, entry)| (day, capture_day(entry, options.include_notes)))
        .filter(|(_, patch)| !patch.is_empty())
        .collect::<BTreeMap<_, _>>();

    let template = Template {
        id: format!("tpl_{}", generate_id()),
        name,
        scope: options.scope,
        days,
        created_at: Utc::now(),
    };
    debug!(id = %template.id, days = template.days.len(), "captured week template");
    template
}

fn capture_day(entry: &DayEntry, include_notes: bool) -> DayPatch {
    let mut pick = DayPatch {
        morning_project: kept(&entry.morning_project),
        midday_project: kept(&entry.midday_project),
        activity: kept(&entry.activity),
        done_morning: entry.done_morning.then_some(true),
        done_midday: entry.done_midday.then_some(true),
        done_activity: entry.done_activity.then_some(true),
        morning_actual_start: kept(&entry.morning_actual_start),
        morning_actual_end: kept(&entry.morning_actual_end),
        midday_actual_start: kept(&entry.midday_actual_start),
        midday_actual_end: kept(&entry.midday_actual_end),
        activity_actual_start: kept(&entry.activity_actual_start),
        activity_actual_end: kept(&entry.activity_actual_end),
        ..DayPatch::default()
    };

    if include_notes {
        pick.morning_notes = kept(&entry.morning_notes);
        pick.midday_notes = kept(&entry.midday_notes);
        pick.activity_notes = kept(&entry.activity_notes);
        pick.gratitude = kept(&entry.gratitude);
        pick.notes = kept(&entry.notes);
        pick.mood = entry.mood.map(Some);
    }

    pick
}

fn kept(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Returns a new week; `week` and `template` are left as they were.
pub fn apply_template_to_week(
    week: &WeekRecord,
    template: &Template,
    options: ApplyOptions,
) -> WeekRecord {
    let mut next = week.clone();
    for day in Day::ALL {
        if !options.scope.contains(day) {
            continue;
        }
        let Some(patch) = template.days.get(&day) else {
            continue;
        };
        patch.merge_into(next.day_mut(day), options.overwrite);
    }
    debug!(
        id = %template.id,
        overwrite = options.overwrite,
        scope = %options.scope,
        "applied template"
    );
    next
}

#[cfg(test)]
mod tests {
    use crate::domain::{BlockKind, Day, DayEntry, DayPatch, WeekRecord};

    use super::{
        ApplyOptions, CaptureOptions, TemplateScope, apply_template_to_week,
        capture_week_as_template,
    };

    fn sample_week() -> WeekRecord {
        let mut week = WeekRecord::empty();
        *week.day_mut(Day::Monday) = DayEntry {
            morning_project: "Alpha".to_string(),
            midday_project: "  ".to_string(),
            done_morning: true,
            done_midday: false,
            morning_actual_start: "08:00".to_string(),
            morning_actual_end: "09:30".to_string(),
            gratitude: "coffee".to_string(),
            mood: Some(4),
            ..DayEntry::default()
        };
        *week.day_mut(Day::Saturday) = DayEntry {
            activity: "Run".to_string(),
            ..DayEntry::default()
        };
        week
    }

    fn template_with(day: Day, patch: DayPatch) -> super::Template {
        let mut template = capture_week_as_template(&WeekRecord::empty(), &CaptureOptions::default());
        template.days.insert(day, patch);
        template
    }

    #[test]
    fn capture_keeps_only_non_blank_fields_and_true_flags() {
        let template = capture_week_as_template(&sample_week(), &CaptureOptions::default());
        assert!(template.id.starts_with("tpl_"));
        assert_eq!(template.name, "My Template");
        assert_eq!(template.days.len(), 2);

        let monday = &template.days[&Day::Monday];
        assert_eq!(monday.morning_project.as_deref(), Some("Alpha"));
        assert_eq!(monday.midday_project, None);
        assert_eq!(monday.done_morning, Some(true));
        assert_eq!(monday.done_midday, None);
        assert_eq!(monday.morning_actual_end.as_deref(), Some("09:30"));
        assert_eq!(monday.gratitude, None);
        assert_eq!(monday.mood, None);
    }

    #[test]
    fn capture_respects_scope_and_notes_flag() {
        let options = CaptureOptions {
            name: "Weekdays".to_string(),
            scope: TemplateScope::Weekdays,
            include_notes: true,
        };
        let template = capture_week_as_template(&sample_week(), &options);
        assert_eq!(template.scope, TemplateScope::Weekdays);
        assert!(!template.days.contains_key(&Day::Saturday));

        let monday = &template.days[&Day::Monday];
        assert_eq!(monday.gratitude.as_deref(), Some("coffee"));
        assert_eq!(monday.mood, Some(Some(4)));
        assert_eq!(monday.notes, None);
    }

    #[test]
    fn fill_blanks_writes_only_into_blank_fields() {
        let template = template_with(Day::Monday, DayPatch::label(BlockKind::Morning, "Alpha"));
        let options = ApplyOptions {
            overwrite: false,
            scope: TemplateScope::Entire,
        };

        let blank = WeekRecord::empty();
        let filled = apply_template_to_week(&blank, &template, options);
        assert_eq!(filled.day(Day::Monday).morning_project, "Alpha");

        let mut taken = WeekRecord::empty();
        taken.day_mut(Day::Monday).morning_project = "Beta".to_string();
        let kept = apply_template_to_week(&taken, &template, options);
        assert_eq!(kept.day(Day::Monday).morning_project, "Beta");

        let mut whitespace = WeekRecord::empty();
        whitespace.day_mut(Day::Monday).morning_project = "   ".to_string();
        let replaced = apply_template_to_week(&whitespace, &template, options);
        assert_eq!(replaced.day(Day::Monday).morning_project, "Alpha");
    }

    #[test]
    fn overwrite_replaces_existing_values() {
        let template = template_with(Day::Monday, DayPatch::label(BlockKind::Morning, "Alpha"));
        let mut week = WeekRecord::empty();
        week.day_mut(Day::Monday).morning_project = "Beta".to_string();
        week.day_mut(Day::Monday).notes = "keep me".to_string();

        let next = apply_template_to_week(
            &week,
            &template,
            ApplyOptions {
                overwrite: true,
                scope: TemplateScope::Entire,
            },
        );
        assert_eq!(next.day(Day::Monday).morning_project, "Alpha");
        assert_eq!(next.day(Day::Monday).notes, "keep me");
        assert_eq!(week.day(Day::Monday).morning_project, "Beta");
    }

    #[test]
    fn apply_skips_days_outside_scope() {
        let mut template = template_with(Day::Saturday, DayPatch::label(BlockKind::Activity, "Yoga"));
        template
            .days
            .insert(Day::Tuesday, DayPatch::label(BlockKind::Activity, "Run"));

        let next = apply_template_to_week(
            &WeekRecord::empty(),
            &template,
            ApplyOptions {
                overwrite: true,
                scope: TemplateScope::Weekends,
            },
        );
        assert_eq!(next.day(Day::Saturday).activity, "Yoga");
        assert_eq!(next.day(Day::Tuesday).activity, "");
        assert_eq!(next.day(Day::Wednesday), &DayEntry::default());
    }

    #[test]
    fn captured_template_round_trips_through_apply() {
        let week = sample_week();
        let template = capture_week_as_template(&week, &CaptureOptions::default());
        let next = apply_template_to_week(&WeekRecord::empty(), &template, ApplyOptions::default());
        assert_eq!(next.day(Day::Monday).morning_project, "Alpha");
        assert_eq!(next.day(Day::Monday).morning_actual_start, "08:00");
        assert_eq!(next.day(Day::Saturday).activity, "Run");
        assert!(!next.day(Day::Monday).done_morning);
    }
}
