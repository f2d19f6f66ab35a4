use std::cell::Cell;
use std::rc::Rc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{BlockKind, DayEntry, DayPatch, SuggestedSlots, TimeRange};
use crate::reconcile::{BlockRanges, effective_ranges};
use crate::time_codec::{Minutes, format_time, parse_strict, snap};

pub const MIN_BLOCK_MINUTES: Minutes = 15;
pub const NUDGE_STEP: Minutes = 15;
pub const NUDGE_STEP_FINE: Minutes = 5;
pub const NUDGE_STEP_COARSE: Minutes = 30;
pub const DOUBLE_CLICK_MS: u64 = 400;

/// Visible part of the day and its vertical scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineWindow {
    pub start_hour: i32,
    pub end_hour: i32,
    pub hour_px: u16,
}

impl Default for TimelineWindow {
    fn default() -> Self {
        Self {
            start_hour: 6,
            end_hour: 22,
            hour_px: 48,
        }
    }
}

impl TimelineWindow {
    pub fn is_valid(&self) -> bool {
        (0..24).contains(&self.start_hour)
            && self.end_hour <= 24
            && self.end_hour > self.start_hour
            && self.hour_px > 0
    }

    pub fn min_minute(&self) -> Minutes {
        self.start_hour * 60
    }

    pub fn max_minute(&self) -> Minutes {
        self.end_hour * 60
    }

    pub fn span(&self) -> Minutes {
        (self.max_minute() - self.min_minute()).max(1)
    }

    pub fn rail_height(&self) -> f64 {
        f64::from((self.end_hour - self.start_hour).max(0)) * f64::from(self.hour_px)
    }

    pub fn clamp(&self, minute: Minutes) -> Minutes {
        minute.clamp(self.min_minute(), self.max_minute())
    }
}

/// Everything the editor reads on each event. Nothing here is owned by the
/// editor; the container passes the selected day afresh every time.
#[derive(Debug, Clone, Copy)]
pub struct TimelineProps<'a> {
    pub entry: &'a DayEntry,
    pub suggested: Option<&'a SuggestedSlots>,
    pub window: TimelineWindow,
    pub active: Option<BlockKind>,
    pub prevent_overlap: bool,
}

impl TimelineProps<'_> {
    pub fn ranges(&self) -> BlockRanges {
        effective_ranges(self.entry, self.suggested, &self.window)
    }

    /// Suggested ranges worth drawing behind the real blocks.
    pub fn ghosts(&self) -> Vec<(BlockKind, TimeRange)> {
        let Some(slots) = self.suggested else {
            return Vec::new();
        };
        BlockKind::ALL
            .into_iter()
            .filter_map(|kind| {
                let slot = slots.get(kind)?;
                let start = parse_strict(&slot.start)?;
                let end = parse_strict(&slot.end)?;
                (end > start).then_some((kind, TimeRange::new(start, end)))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Move,
    ResizeStart,
    ResizeEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeField {
    Start,
    End,
    Both,
}

/// Requests the editor hands back to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineEvent {
    Change(DayPatch),
    Select(BlockKind),
    Edit(BlockKind),
    FocusTimes(BlockKind, TimeField),
    Nudge(BlockKind, Minutes),
}

/// Counts outstanding pointer captures. While one is held the host routes
/// every drag and release to the editor, wherever the pointer is.
#[derive(Debug, Clone, Default)]
pub struct PointerBus {
    captures: Rc<Cell<usize>>,
}

impl PointerBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(&self) -> PointerCapture {
        self.captures.set(self.captures.get() + 1);
        PointerCapture {
            captures: Rc::clone(&self.captures),
        }
    }

    pub fn is_captured(&self) -> bool {
        self.captures.get() > 0
    }
}

/// Released on drop.
#[derive(Debug)]
pub struct PointerCapture {
    captures: Rc<Cell<usize>>,
}

impl Drop for PointerCapture {
    fn drop(&mut self) {
        self.captures.set(self.captures.get().saturating_sub(1));
    }
}

#[derive(Debug)]
pub struct DragSession {
    pub kind: GestureKind,
    pub which: BlockKind,
    pub start_min: Minutes,
    pub end_min: Minutes,
    pub origin_y: f64,
    moved: bool,
    _capture: PointerCapture,
}

/// Rail position in pointer coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rail {
    pub top: f64,
    pub height: f64,
    pub handle: f64,
}

impl Rail {
    pub fn for_window(window: &TimelineWindow) -> Self {
        Self {
            top: 0.0,
            height: window.rail_height(),
            handle: f64::from(window.hour_px) / 8.0,
        }
    }
}

pub struct TimelineEditor {
    rail: Rail,
    bus: PointerBus,
    session: Option<DragSession>,
    last_click: Option<(BlockKind, u64)>,
}

impl TimelineEditor {
    pub fn new(rail: Rail, bus: PointerBus) -> Self {
        Self {
            rail,
            bus,
            session: None,
            last_click: None,
        }
    }

    pub fn set_rail(&mut self, rail: Rail) {
        self.rail = rail;
    }

    pub fn minute_to_offset(&self, minute: Minutes, window: &TimelineWindow) -> f64 {
        let ratio = f64::from(minute - window.min_minute()) / f64::from(window.span());
        ratio * self.rail.height
    }

    /// Which block, and which part of it, sits under `y`. Short blocks have no
    /// handles and always move.
    pub fn hit_test(&self, y: f64, props: &TimelineProps<'_>) -> Option<(BlockKind, GestureKind)> {
        let offset = y - self.rail.top;
        let ranges = props.ranges();
        BlockKind::ALL.into_iter().rev().find_map(|kind| {
            let range = ranges.get(kind);
            let top = self.minute_to_offset(range.start, &props.window);
            let bottom = self.minute_to_offset(range.end, &props.window);
            if offset < top || offset >= bottom.max(top + 1.0) {
                return None;
            }
            let handle = self.rail.handle;
            let gesture = if bottom - top < handle * 3.0 {
                GestureKind::Move
            } else if offset < top + handle {
                GestureKind::ResizeStart
            } else if offset >= bottom - handle {
                GestureKind::ResizeEnd
            } else {
                GestureKind::Move
            };
            Some((kind, gesture))
        })
    }

    /// Starts a session, replacing any stale one.
    pub fn pointer_down(
        &mut self,
        which: BlockKind,
        kind: GestureKind,
        y: f64,
        props: &TimelineProps<'_>,
    ) -> Vec<TimelineEvent> {
        let range = props.ranges().get(which);
        self.session = None;
        self.session = Some(DragSession {
            kind,
            which,
            start_min: range.start,
            end_min: range.end,
            origin_y: y,
            moved: false,
            _capture: self.bus.capture(),
        });
        debug!(block = %which, gesture = ?kind, "drag session started");
        vec![TimelineEvent::Select(which)]
    }

    pub fn pointer_move(&mut self, y: f64, props: &TimelineProps<'_>) -> Vec<TimelineEvent> {
        let rail = self.rail;
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if y != session.origin_y {
            session.moved = true;
        }

        let window = props.window;
        let to_minute = |y: f64| pointer_to_minute(&rail, y, &window);

        // Both edges land on the grid; neighbour and window edges stay exact.
        let candidate = match session.kind {
            GestureKind::Move => {
                let delta = snap(to_minute(y)) - snap(to_minute(session.origin_y));
                TimeRange::new(snap(session.start_min + delta), snap(session.end_min + delta))
            }
            GestureKind::ResizeStart => {
                TimeRange::new(snap(window.clamp(to_minute(y))), snap(session.end_min))
            }
            GestureKind::ResizeEnd => {
                TimeRange::new(snap(session.start_min), snap(window.clamp(to_minute(y))))
            }
        };

        let ranges = props.ranges();
        let committed = commit_range(
            session.which,
            session.kind,
            candidate,
            &ranges,
            &window,
            props.prevent_overlap,
        );
        change_event(session.which, committed, &ranges)
            .into_iter()
            .collect()
    }

    /// Ends the session. A release without movement counts as a click, and a
    /// second click on the same block within the double-click interval also
    /// asks for the time inputs.
    pub fn pointer_up(&mut self, at_ms: u64) -> Vec<TimelineEvent> {
        let Some(session) = self.session.take() else {
            return Vec::new();
        };
        debug!(block = %session.which, moved = session.moved, "drag session ended");
        if session.moved {
            self.last_click = None;
            return Vec::new();
        }

        let which = session.which;
        let mut events = vec![TimelineEvent::Edit(which)];
        match self.last_click {
            Some((previous, clicked_at))
                if previous == which && at_ms.saturating_sub(clicked_at) <= DOUBLE_CLICK_MS =>
            {
                events.push(TimelineEvent::FocusTimes(which, TimeField::Both));
                self.last_click = None;
            }
            _ => self.last_click = Some((which, at_ms)),
        }
        events
    }

    /// The pointer left the terminal window.
    pub fn pointer_leave(&mut self) {
        if self.session.take().is_some() {
            debug!("drag session abandoned");
        }
    }

    /// Arrow keys on the active block ask the owner to nudge it.
    pub fn key_down(
        &self,
        which: BlockKind,
        key: KeyEvent,
        props: &TimelineProps<'_>,
    ) -> Vec<TimelineEvent> {
        if props.active != Some(which) {
            return Vec::new();
        }
        let step = nudge_step(key.modifiers);
        match key.code {
            KeyCode::Up => vec![TimelineEvent::Nudge(which, -step)],
            KeyCode::Down => vec![TimelineEvent::Nudge(which, step)],
            _ => Vec::new(),
        }
    }
}

pub fn nudge_step(modifiers: KeyModifiers) -> Minutes {
    if modifiers.contains(KeyModifiers::ALT) {
        NUDGE_STEP_COARSE
    } else if modifiers.contains(KeyModifiers::SHIFT) {
        NUDGE_STEP_FINE
    } else {
        NUDGE_STEP
    }
}

/// Pointer position to minute of day, clamped to the rail.
fn pointer_to_minute(rail: &Rail, y: f64, window: &TimelineWindow) -> Minutes {
    let ratio = ((y - rail.top) / rail.height.max(1.0)).clamp(0.0, 1.0);
    (f64::from(window.min_minute()) + ratio * f64::from(window.span())).round() as Minutes
}

fn change_event(which: BlockKind, committed: TimeRange, ranges: &BlockRanges) -> Option<TimelineEvent> {
    if committed == ranges.get(which) {
        return None;
    }
    Some(TimelineEvent::Change(DayPatch::times(
        which,
        format_time(committed.start),
        format_time(committed.end),
    )))
}

/// Room the block may occupy: the window, narrowed to its chronological
/// neighbours when overlap is prevented.
fn bounds(
    which: BlockKind,
    ranges: &BlockRanges,
    window: &TimelineWindow,
    prevent_overlap: bool,
) -> (Minutes, Minutes) {
    let mut lower = window.min_minute();
    let mut upper = window.max_minute();
    if prevent_overlap {
        if let Some(previous) = which.previous() {
            lower = lower.max(ranges.get(previous).end);
        }
        if let Some(following) = which.following() {
            upper = upper.min(ranges.get(following).start);
        }
    }
    (lower, upper)
}

fn clamp_jointly(range: TimeRange, window: &TimelineWindow) -> TimeRange {
    let duration = range.duration();
    if duration >= window.span() {
        return TimeRange::new(window.min_minute(), window.max_minute());
    }
    if range.start < window.min_minute() {
        return TimeRange::new(window.min_minute(), window.min_minute() + duration);
    }
    if range.end > window.max_minute() {
        return TimeRange::new(window.max_minute() - duration, window.max_minute());
    }
    range
}

/// Turns a candidate range into the one that gets stored: window containment,
/// neighbour truncation, then the minimum duration. When the block has less
/// than the minimum room available the current range is kept.
pub fn commit_range(
    which: BlockKind,
    gesture: GestureKind,
    candidate: TimeRange,
    ranges: &BlockRanges,
    window: &TimelineWindow,
    prevent_overlap: bool,
) -> TimeRange {
    let (lower, upper) = bounds(which, ranges, window, prevent_overlap);
    if upper - lower < MIN_BLOCK_MINUTES {
        return ranges.get(which);
    }

    let mut range = match gesture {
        GestureKind::Move => clamp_jointly(candidate, window),
        GestureKind::ResizeStart | GestureKind::ResizeEnd => candidate,
    };
    range.start = range.start.max(lower);
    range.end = range.end.min(upper);

    if range.duration() < MIN_BLOCK_MINUTES {
        match gesture {
            GestureKind::ResizeStart => range.start = range.end - MIN_BLOCK_MINUTES,
            GestureKind::Move | GestureKind::ResizeEnd => range.end = range.start + MIN_BLOCK_MINUTES,
        }
    }
    if range.start < lower {
        range.start = lower;
        range.end = range.end.max(lower + MIN_BLOCK_MINUTES);
    }
    if range.end > upper {
        range.end = upper;
        range.start = range.start.min(upper - MIN_BLOCK_MINUTES);
    }
    range
}

/// The owner's answer to [`TimelineEvent::Nudge`]: both edges shift, with the
/// same containment and overlap rules as a drag.
pub fn nudge_patch(which: BlockKind, delta: Minutes, props: &TimelineProps<'_>) -> Option<DayPatch> {
    let ranges = props.ranges();
    let current = ranges.get(which);
    let candidate = TimeRange::new(current.start + delta, current.end + delta);
    let committed = commit_range(
        which,
        GestureKind::Move,
        candidate,
        &ranges,
        &props.window,
        props.prevent_overlap,
    );
    match change_event(which, committed, &ranges) {
        Some(TimelineEvent::Change(patch)) => Some(patch),
        _ => None,
    }
}
