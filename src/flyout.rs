use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::debug;

use crate::domain::{BlockKind, ClockRange, DayEntry, DayPatch, Settings};
use crate::time_codec::{format_time, parse_strict, parse_time};

pub const CUSTOM_OPTION: &str = "Custom…";
const TIME_STEP: i32 = 15;

/// Which block of which day the panel edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlyoutTarget {
    pub date: NaiveDate,
    pub kind: BlockKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlyoutField {
    Done,
    Label,
    Start,
    End,
    Suggested,
    Notes,
}

impl FlyoutField {
    pub const ALL: [FlyoutField; 6] = [
        FlyoutField::Done,
        FlyoutField::Label,
        FlyoutField::Start,
        FlyoutField::End,
        FlyoutField::Suggested,
        FlyoutField::Notes,
    ];

    pub fn title(self) -> &'static str {
        match self {
            FlyoutField::Done => "Completed",
            FlyoutField::Label => "Label",
            FlyoutField::Start => "Start",
            FlyoutField::End => "End",
            FlyoutField::Suggested => "Suggested",
            FlyoutField::Notes => "Notes",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlyoutEvent {
    Change(DayPatch),
    EnsureActivity(String),
    Close,
}

/// Read-only inputs for one key press.
#[derive(Debug, Clone, Copy)]
pub struct FlyoutProps<'a> {
    pub entry: &'a DayEntry,
    pub settings: &'a Settings,
    pub suggested: Option<&'a ClockRange>,
}

impl FlyoutProps<'_> {
    fn suggestion(&self) -> Option<&ClockRange> {
        self.suggested
            .filter(|slot| !slot.start.trim().is_empty() && !slot.end.trim().is_empty())
    }
}

/// Side panel for a single block. Field edits go straight out as patches;
/// the only thing held here is the custom label text box.
#[derive(Debug, Default)]
pub struct BlockFlyout {
    open: bool,
    target: Option<FlyoutTarget>,
    field: Option<FlyoutField>,
    custom: Option<String>,
}

impl BlockFlyout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open && self.target.is_some()
    }

    pub fn target(&self) -> Option<FlyoutTarget> {
        self.target
    }

    pub fn field(&self) -> FlyoutField {
        self.field.unwrap_or(FlyoutField::Done)
    }

    /// Moves the cursor, e.g. onto the time inputs after a double click.
    pub fn focus(&mut self, field: FlyoutField) {
        self.field = Some(field);
    }

    pub fn custom_text(&self) -> Option<&str> {
        self.custom.as_deref()
    }

    /// Called with the owner's current inputs. Local state resets whenever the
    /// open flag or the target changes.
    pub fn sync(&mut self, open: bool, target: Option<FlyoutTarget>, props: &FlyoutProps<'_>) {
        if self.open == open && self.target == target {
            return;
        }
        self.open = open;
        self.target = target;
        self.field = Some(FlyoutField::Done);
        self.custom = target.and_then(|target| {
            let label = props.entry.label(target.kind);
            let listed = props
                .settings
                .label_options(target.kind)
                .iter()
                .any(|option| option == label);
            (!label.trim().is_empty() && !listed).then(|| label.to_string())
        });
        if let Some(target) = target.filter(|_| open) {
            debug!(date = %target.date, block = %target.kind, "flyout opened");
        }
    }

    pub fn close(&mut self) {
        self.open = false;
        self.custom = None;
    }

    pub fn visible_fields(&self, props: &FlyoutProps<'_>) -> Vec<FlyoutField> {
        let has_suggestion = props.suggestion().is_some();
        FlyoutField::ALL
            .into_iter()
            .filter(|field| *field != FlyoutField::Suggested || has_suggestion)
            .collect()
    }

    /// Label choices with the custom escape hatch appended.
    pub fn options(&self, props: &FlyoutProps<'_>) -> Vec<String> {
        let Some(target) = self.target else {
            return Vec::new();
        };
        let mut options = props.settings.label_options(target.kind);
        options.push(CUSTOM_OPTION.to_string());
        options
    }

    pub fn handle_key(&mut self, key: KeyEvent, props: &FlyoutProps<'_>) -> Vec<FlyoutEvent> {
        let Some(target) = self.target.filter(|_| self.open) else {
            return Vec::new();
        };
        let kind = target.kind;

        match key.code {
            KeyCode::Esc => {
                self.close();
                return vec![FlyoutEvent::Close];
            }
            KeyCode::Tab => {
                self.step_field(1, props);
                return Vec::new();
            }
            KeyCode::BackTab => {
                self.step_field(-1, props);
                return Vec::new();
            }
            _ => {}
        }

        match self.field() {
            FlyoutField::Done => match key.code {
                KeyCode::Char(' ') | KeyCode::Enter => {
                    change(DayPatch::done(kind, !props.entry.done(kind)))
                }
                _ => Vec::new(),
            },
            FlyoutField::Label => self.label_key(kind, key, props),
            FlyoutField::Start => {
                let (current, _) = props.entry.actual(kind);
                let fallback = props.suggestion().map(|slot| slot.start.as_str());
                edit_time(current, fallback, key)
                    .map(|value| change(DayPatch::start(kind, value)))
                    .unwrap_or_default()
            }
            FlyoutField::End => {
                let (_, current) = props.entry.actual(kind);
                let fallback = props.suggestion().map(|slot| slot.end.as_str());
                edit_time(current, fallback, key)
                    .map(|value| change(DayPatch::end(kind, value)))
                    .unwrap_or_default()
            }
            FlyoutField::Suggested => match (key.code, props.suggestion()) {
                (KeyCode::Enter | KeyCode::Char(' '), Some(slot)) => {
                    change(DayPatch::times(kind, slot.start.clone(), slot.end.clone()))
                }
                _ => Vec::new(),
            },
            FlyoutField::Notes => {
                let notes = props.entry.block_notes(kind);
                edit_text(notes, key, true)
                    .map(|value| change(DayPatch::block_notes(kind, value)))
                    .unwrap_or_default()
            }
        }
    }

    fn step_field(&mut self, step: isize, props: &FlyoutProps<'_>) {
        let fields = self.visible_fields(props);
        let current = fields
            .iter()
            .position(|field| *field == self.field())
            .unwrap_or(0) as isize;
        let len = fields.len() as isize;
        let next = (current + step).rem_euclid(len.max(1)) as usize;
        self.field = fields.get(next).copied();
    }

    fn label_key(&mut self, kind: BlockKind, key: KeyEvent, props: &FlyoutProps<'_>) -> Vec<FlyoutEvent> {
        if let Some(text) = self.custom.as_mut() {
            let edited = match key.code {
                KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                    text.push(ch);
                    true
                }
                KeyCode::Backspace => text.pop().is_some(),
                _ => false,
            };
            if edited {
                let value = text.clone();
                let mut events = change(DayPatch::label(kind, value.clone()));
                if kind == BlockKind::Activity && !value.trim().is_empty() {
                    events.push(FlyoutEvent::EnsureActivity(value.trim().to_string()));
                }
                return events;
            }
        }

        let step = match key.code {
            KeyCode::Right | KeyCode::Down => 1,
            KeyCode::Left | KeyCode::Up => -1,
            _ => return Vec::new(),
        };
        let options = self.options(props);
        let current = if self.custom.is_some() {
            options.len() - 1
        } else {
            let label = props.entry.label(kind);
            options
                .iter()
                .position(|option| option == label)
                .unwrap_or(options.len() - 1)
        };
        let next = (current as isize + step).rem_euclid(options.len() as isize) as usize;
        if next == options.len() - 1 {
            self.custom = Some(String::new());
            change(DayPatch::label(kind, ""))
        } else {
            self.custom = None;
            change(DayPatch::label(kind, options[next].clone()))
        }
    }
}

fn change(patch: DayPatch) -> Vec<FlyoutEvent> {
    vec![FlyoutEvent::Change(patch)]
}

/// Typing edits the raw string; Up and Down step a parseable value by a
/// quarter hour.
fn edit_time(current: Option<&str>, fallback: Option<&str>, key: KeyEvent) -> Option<String> {
    match key.code {
        KeyCode::Up | KeyCode::Down => {
            let delta = if key.code == KeyCode::Up { -TIME_STEP } else { TIME_STEP };
            let base = parse_time(current, fallback);
            Some(format_time((base + delta).max(0)))
        }
        KeyCode::Char(ch) if ch.is_ascii_digit() || ch == ':' => {
            let mut value = current.unwrap_or_default().to_string();
            if parse_strict(&value).is_some() && value.len() >= 5 {
                value.clear();
            }
            value.push(ch);
            Some(value)
        }
        _ => edit_text(current.unwrap_or_default(), key, false),
    }
}

fn edit_text(current: &str, key: KeyEvent, multiline: bool) -> Option<String> {
    let mut value = current.to_string();
    match key.code {
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => value.push(ch),
        KeyCode::Enter if multiline => value.push('\n'),
        KeyCode::Backspace => {
            value.pop()?;
        }
        _ => return None,
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    use crate::domain::{BlockKind, ClockRange, DayEntry, DayPatch, Settings};

    use super::{BlockFlyout, FlyoutEvent, FlyoutField, FlyoutProps, FlyoutTarget};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn target(kind: BlockKind) -> FlyoutTarget {
        FlyoutTarget {
            date: NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid date"),
            kind,
        }
    }

    fn opened(kind: BlockKind, props: &FlyoutProps<'_>) -> BlockFlyout {
        let mut flyout = BlockFlyout::new();
        flyout.sync(true, Some(target(kind)), props);
        flyout
    }

    fn focus(flyout: &mut BlockFlyout, field: FlyoutField, props: &FlyoutProps<'_>) {
        for _ in 0..FlyoutField::ALL.len() {
            if flyout.field() == field {
                return;
            }
            flyout.handle_key(key(KeyCode::Tab), props);
        }
        panic!("field {field:?} not reachable");
    }

    #[test]
    fn toggling_done_emits_a_single_key_patch() {
        let entry = DayEntry::default();
        let settings = Settings::default();
        let props = FlyoutProps {
            entry: &entry,
            settings: &settings,
            suggested: None,
        };
        let mut flyout = opened(BlockKind::Midday, &props);
        assert_eq!(
            flyout.handle_key(key(KeyCode::Char(' ')), &props),
            vec![FlyoutEvent::Change(DayPatch::done(BlockKind::Midday, true))]
        );
    }

    #[test]
    fn choosing_custom_clears_the_label_and_reveals_the_box() {
        let entry = DayEntry {
            activity: "Yoga".to_string(),
            ..DayEntry::default()
        };
        let settings = Settings::default();
        let props = FlyoutProps {
            entry: &entry,
            settings: &settings,
            suggested: None,
        };
        let mut flyout = opened(BlockKind::Activity, &props);
        focus(&mut flyout, FlyoutField::Label, &props);

        let events = flyout.handle_key(key(KeyCode::Right), &props);
        assert_eq!(
            events,
            vec![FlyoutEvent::Change(DayPatch::label(BlockKind::Activity, ""))]
        );
        assert_eq!(flyout.custom_text(), Some(""));

        let events = flyout.handle_key(key(KeyCode::Char('S')), &props);
        assert_eq!(
            events,
            vec![
                FlyoutEvent::Change(DayPatch::label(BlockKind::Activity, "S")),
                FlyoutEvent::EnsureActivity("S".to_string()),
            ]
        );
    }

    #[test]
    fn custom_project_does_not_touch_activity_list() {
        let entry = DayEntry {
            morning_project: "Linocut Book".to_string(),
            ..DayEntry::default()
        };
        let settings = Settings::default();
        let props = FlyoutProps {
            entry: &entry,
            settings: &settings,
            suggested: None,
        };
        let mut flyout = opened(BlockKind::Morning, &props);
        focus(&mut flyout, FlyoutField::Label, &props);
        assert_eq!(
            flyout.handle_key(key(KeyCode::Left), &props),
            vec![FlyoutEvent::Change(DayPatch::label(BlockKind::Morning, "Music Practice"))]
        );
        assert_eq!(flyout.custom_text(), None);

        flyout.handle_key(key(KeyCode::Right), &props);
        assert_eq!(flyout.custom_text(), Some(""));
        let events = flyout.handle_key(key(KeyCode::Char('Z')), &props);
        assert_eq!(
            events,
            vec![FlyoutEvent::Change(DayPatch::label(BlockKind::Morning, "Z"))]
        );
    }

    #[test]
    fn cycling_labels_walks_the_project_list() {
        let entry = DayEntry {
            morning_project: "Freelance UX".to_string(),
            ..DayEntry::default()
        };
        let settings = Settings::default();
        let props = FlyoutProps {
            entry: &entry,
            settings: &settings,
            suggested: None,
        };
        let mut flyout = opened(BlockKind::Morning, &props);
        focus(&mut flyout, FlyoutField::Label, &props);
        assert_eq!(
            flyout.handle_key(key(KeyCode::Right), &props),
            vec![FlyoutEvent::Change(DayPatch::label(BlockKind::Morning, "Music Practice"))]
        );
    }

    #[test]
    fn local_state_resets_when_target_changes() {
        let entry = DayEntry {
            morning_project: "Side quest".to_string(),
            ..DayEntry::default()
        };
        let settings = Settings::default();
        let props = FlyoutProps {
            entry: &entry,
            settings: &settings,
            suggested: None,
        };
        let mut flyout = opened(BlockKind::Morning, &props);
        assert_eq!(flyout.custom_text(), Some("Side quest"));
        focus(&mut flyout, FlyoutField::Notes, &props);

        flyout.sync(true, Some(target(BlockKind::Midday)), &props);
        assert_eq!(flyout.custom_text(), None);
        assert_eq!(flyout.field(), FlyoutField::Done);

        flyout.sync(true, Some(target(BlockKind::Midday)), &props);
        assert_eq!(flyout.field(), FlyoutField::Done);
    }

    #[test]
    fn suggested_shortcut_sets_both_times() {
        let entry = DayEntry::default();
        let settings = Settings::default();
        let slot = ClockRange::new("13:00", "15:00");
        let props = FlyoutProps {
            entry: &entry,
            settings: &settings,
            suggested: Some(&slot),
        };
        let mut flyout = opened(BlockKind::Midday, &props);
        focus(&mut flyout, FlyoutField::Suggested, &props);
        assert_eq!(
            flyout.handle_key(key(KeyCode::Enter), &props),
            vec![FlyoutEvent::Change(DayPatch::times(BlockKind::Midday, "13:00", "15:00"))]
        );

        let bare = FlyoutProps {
            suggested: None,
            ..props
        };
        assert!(!flyout.visible_fields(&bare).contains(&FlyoutField::Suggested));
    }

    #[test]
    fn time_fields_step_and_accept_typing() {
        let entry = DayEntry {
            morning_actual_start: "08:00".to_string(),
            ..DayEntry::default()
        };
        let settings = Settings::default();
        let props = FlyoutProps {
            entry: &entry,
            settings: &settings,
            suggested: None,
        };
        let mut flyout = opened(BlockKind::Morning, &props);
        focus(&mut flyout, FlyoutField::Start, &props);
        assert_eq!(
            flyout.handle_key(key(KeyCode::Down), &props),
            vec![FlyoutEvent::Change(DayPatch::start(BlockKind::Morning, "08:15"))]
        );
        assert_eq!(
            flyout.handle_key(key(KeyCode::Char('7')), &props),
            vec![FlyoutEvent::Change(DayPatch::start(BlockKind::Morning, "7"))]
        );

        focus(&mut flyout, FlyoutField::End, &props);
        assert_eq!(
            flyout.handle_key(key(KeyCode::Char('9')), &props),
            vec![FlyoutEvent::Change(DayPatch::end(BlockKind::Morning, "9"))]
        );
    }

    #[test]
    fn notes_emit_the_whole_value_and_escape_closes() {
        let entry = DayEntry {
            activity_notes: "hill".to_string(),
            ..DayEntry::default()
        };
        let settings = Settings::default();
        let props = FlyoutProps {
            entry: &entry,
            settings: &settings,
            suggested: None,
        };
        let mut flyout = opened(BlockKind::Activity, &props);
        focus(&mut flyout, FlyoutField::Notes, &props);
        assert_eq!(
            flyout.handle_key(key(KeyCode::Char('s')), &props),
            vec![FlyoutEvent::Change(DayPatch::block_notes(BlockKind::Activity, "hills"))]
        );
        assert_eq!(flyout.handle_key(key(KeyCode::Esc), &props), vec![FlyoutEvent::Close]);
        assert!(!flyout.is_open());
        assert!(flyout.handle_key(key(KeyCode::Char('x')), &props).is_empty());
    }
}
