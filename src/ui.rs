use std::error::Error;
use std::io;
use std::time::{Duration as StdDuration, Instant};

use chrono::{Datelike, Duration, Local, Utc};
use crossterm::event::{
	self, DisableMouseCapture, EnableMouseCapture, Event as CEvent, KeyCode, KeyEvent, KeyEventKind,
	MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use crossterm::{ExecutableCommand, execute};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use tracing::{error, info, warn};

use crate::domain::{BlockKind, ClockRange, Day, DayPatch, Settings, shift_week};
use crate::flyout::{BlockFlyout, FlyoutEvent, FlyoutField, FlyoutProps, FlyoutTarget};
use crate::planner::{Planner, Progress};
use crate::reconcile::variance_minutes;
use crate::storage::{FileStore, StorageProvider, load_week, save_week_with_progress};
use crate::templates::{ApplyOptions, CaptureOptions, TemplateScope};
use crate::time_codec::{Minutes, format_time};
use crate::timeline::{
	PointerBus, Rail, TimeField, TimelineEditor, TimelineEvent, TimelineProps, TimelineWindow,
};

const FOCUSED_PANEL_BORDER_COLOR: Color = Color::Yellow;
const INACTIVE_PANEL_BORDER_COLOR: Color = Color::DarkGray;
const HIGHLIGHT_BACKGROUND_COLOR: Color = Color::Rgb(42, 45, 52);
const GHOST_COLOR: Color = Color::Rgb(58, 62, 70);
const HOUR_LABEL_WIDTH: u16 = 6;

pub fn run_dashboard(
	store: &FileStore,
	planner: &mut Planner,
	progress: &mut Progress,
) -> Result<(), Box<dyn Error>> {
	enable_raw_mode()?;
	let mut stdout = io::stdout();
	stdout.execute(EnterAlternateScreen)?;
	stdout.execute(EnableMouseCapture)?;
	let backend = CrosstermBackend::new(stdout);
	let mut terminal = Terminal::new(backend)?;

	let result = run_event_loop(&mut terminal, store, planner, progress);

	disable_raw_mode()?;
	execute!(terminal.backend_mut(), DisableMouseCapture, LeaveAlternateScreen)?;
	terminal.show_cursor()?;

	result
}

fn run_event_loop(
	terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
	store: &FileStore,
	planner: &mut Planner,
	progress: &mut Progress,
) -> Result<(), Box<dyn Error>> {
	let mut app = App::new(planner.window());
	info!(week = %planner.week_start(), "dashboard started");
	fill_blank_week(&mut app, store, planner, progress);

	loop {
		let size = terminal.size()?;
		let layout = dashboard_layout(Rect::new(0, 0, size.width, size.height));
		app.editor.set_rail(rail_for(&layout));
		app.sync_flyout(planner);
		terminal.draw(|frame| draw_dashboard(frame, &app, planner, progress, &layout))?;

		if !event::poll(StdDuration::from_millis(250))? {
			continue;
		}

		let should_quit = match event::read()? {
			CEvent::Key(key) => {
				if key.kind != KeyEventKind::Press {
					continue;
				}
				if app.flyout.is_open() {
					handle_flyout_key(&mut app, key, store, planner, progress);
					false
				} else {
					match &app.mode {
						InputMode::Prompt(_) => handle_prompt_key(&mut app, key.code, store, planner, progress),
						InputMode::Select(_) => handle_select_key(&mut app, key.code, store, planner, progress),
						InputMode::Normal => handle_normal_key(&mut app, key, store, planner, progress),
					}
				}
			}
			CEvent::Mouse(mouse) => {
				handle_mouse(&mut app, mouse, &layout, store, planner, progress);
				false
			}
			CEvent::FocusLost => {
				app.editor.pointer_leave();
				false
			}
			_ => false,
		};

		if should_quit {
			break;
		}
	}

	Ok(())
}

struct DashboardLayout {
	days: Rect,
	timeline: Rect,
	rail: Rect,
	fields: Rect,
	footer: Rect,
}

fn dashboard_layout(area: Rect) -> DashboardLayout {
	let layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Min(12), Constraint::Length(4)])
		.split(area);

	let body = Layout::default()
		.direction(Direction::Horizontal)
		.constraints([
			Constraint::Percentage(26),
			Constraint::Percentage(44),
			Constraint::Percentage(30),
		])
		.split(layout[0]);

	let timeline = body[1];
	let inner = Rect::new(
		timeline.x.saturating_add(1),
		timeline.y.saturating_add(1),
		timeline.width.saturating_sub(2),
		timeline.height.saturating_sub(2),
	);
	let rail = Rect::new(
		inner.x.saturating_add(HOUR_LABEL_WIDTH),
		inner.y,
		inner.width.saturating_sub(HOUR_LABEL_WIDTH),
		inner.height,
	);

	DashboardLayout {
		days: body[0],
		timeline,
		rail,
		fields: body[2],
		footer: layout[1],
	}
}

/// The rail in terminal cells, one row per handle.
fn rail_for(layout: &DashboardLayout) -> Rail {
	Rail {
		top: f64::from(layout.rail.y),
		height: f64::from(layout.rail.height),
		handle: 1.0,
	}
}

fn draw_dashboard(frame: &mut Frame, app: &App, planner: &Planner, progress: &Progress, layout: &DashboardLayout) {
	render_days_panel(frame, layout.days, app, planner);
	render_timeline_panel(frame, layout, app, planner);
	render_fields_panel(frame, layout.fields, app, planner, progress);
	render_footer(frame, layout.footer, app);

	if app.flyout.is_open() {
		render_flyout(frame, app, planner);
	}
	if let InputMode::Select(select) = &app.mode {
		render_select_popup(frame, select);
	}
}

fn render_days_panel(frame: &mut Frame, area: Rect, app: &App, planner: &Planner) {
	let items = Day::ALL
		.into_iter()
		.map(|day| {
			let count = planner.objectives(day);
			let date = planner.date_of(day);
			let marks = BlockKind::ALL
				.into_iter()
				.map(|kind| if planner.entry(day).done(kind) { '●' } else { '○' })
				.collect::<String>();
			let style = if count.completed == count.total {
				Style::default().fg(Color::LightGreen)
			} else {
				Style::default()
			};
			ListItem::new(Line::from(vec![
				Span::raw(format!("{} {} ", date.format("%a %d"), marks)),
				Span::styled(format!("{}/{} {:>3}%", count.completed, count.total, count.pct), style),
			]))
		})
		.collect::<Vec<_>>();

	let mut state = ListState::default();
	state.select(Some(app.selected_day.index()));

	let title = format!(
		"Week {} - {}",
		planner.week_start().format("%d %b"),
		(planner.week_start() + Duration::days(6)).format("%d %b")
	);
	let list = List::new(items)
		.block(
			Block::default()
				.borders(Borders::ALL)
				.title(title)
				.border_style(border_style(app.focus == FocusPane::Days)),
		)
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD));

	frame.render_stateful_widget(list, area, &mut state);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RailRow {
	hour: Option<i32>,
	block: Option<BlockKind>,
	block_start: bool,
	ghost: bool,
}

/// What each terminal row of the rail shows.
fn rail_rows(props: &TimelineProps<'_>, height: u16) -> Vec<RailRow> {
	let window = props.window;
	let ranges = props.ranges();
	let ghosts = props.ghosts();
	let rows = f64::from(height.max(1));
	let span = f64::from(window.span());

	(0..height)
		.map(|row| {
			let from = f64::from(window.min_minute()) + f64::from(row) / rows * span;
			let to = f64::from(window.min_minute()) + f64::from(row + 1) / rows * span;
			let covers = |start: Minutes, end: Minutes| f64::from(start) < to && f64::from(end) > from;
			let block = ranges.iter().find(|(_, range)| covers(range.start, range.end));
			let hour = (window.start_hour..=window.end_hour).find(|hour| {
				let minute = f64::from(hour * 60);
				minute >= from && minute < to
			});
			RailRow {
				hour,
				block: block.map(|(kind, _)| kind),
				block_start: block.is_some_and(|(_, range)| f64::from(range.start) >= from),
				ghost: ghosts.iter().any(|(_, range)| covers(range.start, range.end)),
			}
		})
		.collect()
}

fn render_timeline_panel(frame: &mut Frame, layout: &DashboardLayout, app: &App, planner: &Planner) {
	let day = app.selected_day;
	let props = planner.timeline_props(day, Some(app.active_block));
	let ranges = props.ranges();
	let entry = planner.entry(day);
	let width = usize::from(layout.rail.width);

	let lines = rail_rows(&props, layout.rail.height)
		.into_iter()
		.map(|row| {
			let label = row
				.hour
				.map(|hour| format!("{:02}:00 ", hour))
				.unwrap_or_else(|| " ".repeat(usize::from(HOUR_LABEL_WIDTH)));
			let mut spans = vec![Span::styled(label, Style::default().fg(Color::DarkGray))];
			match row.block {
				Some(kind) => {
					let range = ranges.get(kind);
					let text = if row.block_start {
						let mark = if entry.done(kind) { "✓ " } else { "" };
						let name = if entry.label(kind).trim().is_empty() {
							kind.title()
						} else {
							entry.label(kind)
						};
						format!(
							" {mark}{name} {}-{}",
							format_time(range.start),
							format_time(range.end)
						)
					} else {
						String::new()
					};
					let mut style = Style::default().bg(block_color(kind, entry.label(kind), planner.settings())).fg(Color::Black);
					if kind == app.active_block {
						style = style.add_modifier(Modifier::BOLD);
					}
					spans.push(Span::styled(format!("{text:<width$}"), style));
				}
				None if row.ghost => {
					spans.push(Span::styled(" ".repeat(width), Style::default().bg(GHOST_COLOR)));
				}
				None => spans.push(Span::styled("┆", Style::default().fg(Color::DarkGray))),
			}
			Line::from(spans)
		})
		.collect::<Vec<_>>();

	let title = format!(
		"{} | active: {}",
		planner.date_of(day).format("%A, %d %B %Y"),
		app.active_block.title()
	);
	let panel = Paragraph::new(lines).block(
		Block::default()
			.borders(Borders::ALL)
			.title(title)
			.border_style(border_style(app.focus == FocusPane::Timeline)),
	);
	frame.render_widget(panel, layout.timeline);
}

fn render_fields_panel(frame: &mut Frame, area: Rect, app: &App, planner: &Planner, progress: &Progress) {
	let day = app.selected_day;
	let entry = planner.entry(day);
	let field_style = |field: DayField| {
		if app.focus == FocusPane::Fields && app.day_field == field {
			Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
		} else {
			Style::default()
		}
	};

	let mut lines = vec![
		Line::from(vec![
			Span::styled("Gratitude: ", field_style(DayField::Gratitude)),
			Span::raw(entry.gratitude.clone()),
		]),
		Line::from(vec![
			Span::styled("Notes: ", field_style(DayField::Notes)),
			Span::raw(entry.notes.clone()),
		]),
		Line::from(vec![
			Span::styled("Mood: ", field_style(DayField::Mood)),
			Span::raw(
				entry
					.mood
					.map(|mood| {
						let mood = mood.min(5);
						format!("{}{}", "★".repeat(usize::from(mood)), "☆".repeat(usize::from(5 - mood)))
					})
					.unwrap_or_else(|| "(unset)".to_string()),
			),
		]),
		Line::from(vec![
			Span::styled("Therapy: ", field_style(DayField::Therapy)),
			Span::raw(if entry.therapy { "yes" } else { "no" }),
		]),
		Line::from(""),
		Line::from(format!("Blocks: {}", app.active_block.title())),
	];

	for kind in BlockKind::ALL {
		let (start, end) = entry.actual(kind);
		let suggested = planner.settings().suggested_slots.get(kind);
		let actual = start.zip(end).map(|(start, end)| ClockRange::new(start, end));
		let variance = variance_minutes(suggested, actual.as_ref());
		let drift = match (variance.start_delta, variance.duration_delta) {
			(Some(start), Some(duration)) => format!(" drift {start}m/{duration}m"),
			_ => String::new(),
		};
		let emoji = planner
			.settings()
			.emoji_for(kind, entry.label(kind))
			.map(|emoji| format!("{emoji} "))
			.unwrap_or_default();
		lines.push(Line::from(format!(
			"{} {}{}{}",
			if entry.done(kind) { "[x]" } else { "[ ]" },
			emoji,
			if entry.label(kind).is_empty() { "-" } else { entry.label(kind) },
			drift
		)));
	}

	let today = Local::now().date_naive();
	lines.push(Line::from(""));
	lines.push(Line::from(format!(
		"Week completion: {:.0}%",
		planner.weekly_completion() * 100.0
	)));
	lines.push(Line::from(format!(
		"Streak: {} days (best {})",
		progress.current_streak(today),
		progress.best_streak
	)));

	let panel = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
		Block::default()
			.borders(Borders::ALL)
			.title("Day")
			.border_style(border_style(app.focus == FocusPane::Fields)),
	);
	frame.render_widget(panel, area);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
	let footer_lines = match &app.mode {
		InputMode::Normal => vec![
			Line::from("←/→ pane | Tab block | ↑/↓ day, nudge or field (Shift 5m, Alt 30m) | Enter edit | q quit"),
			Line::from("[ ] week | f fill blanks | t capture template | a apply template | +/- mood | mouse drag blocks"),
			Line::from(app.status.clone()),
		],
		InputMode::Prompt(prompt) => vec![
			Line::from(prompt.title.clone()),
			Line::from(format!("> {}", prompt.input)),
			Line::from("Enter submit | Esc cancel"),
		],
		InputMode::Select(select) => vec![
			Line::from(select.title.clone()),
			Line::from(format!(
				"Selected: {}",
				select
					.selected_option()
					.map(|option| option.label.as_str())
					.unwrap_or("(none)")
			)),
			Line::from("j/k or arrows move | Enter choose | Esc cancel"),
		],
	};

	let footer = Paragraph::new(footer_lines).block(Block::default().borders(Borders::ALL).title("Shortcuts"));
	frame.render_widget(footer, area);
}

fn render_flyout(frame: &mut Frame, app: &App, planner: &Planner) {
	let Some(target) = app.flyout.target() else {
		return;
	};
	let Some(day) = planner.day_of(target.date) else {
		return;
	};
	let kind = target.kind;
	let entry = planner.entry(day);
	let props = flyout_props(planner, day, kind);
	let area = centered_rect(60, 60, frame.area());
	frame.render_widget(Clear, area);

	let (start, end) = entry.actual(kind);
	let mut lines = Vec::new();
	for field in app.flyout.visible_fields(&props) {
		let value = match field {
			FlyoutField::Done => {
				let mark = if entry.done(kind) { "[x]" } else { "[ ]" };
				format!("{mark} Mark as completed")
			}
			FlyoutField::Label => match app.flyout.custom_text() {
				Some(text) => format!("Custom…: {text}_"),
				None => {
					let label = entry.label(kind);
					let emoji = planner
						.settings()
						.emoji_for(kind, label)
						.map(|emoji| format!("{emoji} "))
						.unwrap_or_default();
					format!("◀ {emoji}{label} ▶")
				}
			},
			FlyoutField::Start => start.unwrap_or("--:--").to_string(),
			FlyoutField::End => end.unwrap_or("--:--").to_string(),
			FlyoutField::Suggested => props
				.suggested
				.map(|slot| format!("{}–{} (Enter to apply)", slot.start, slot.end))
				.unwrap_or_default(),
			FlyoutField::Notes => entry.block_notes(kind).to_string(),
		};
		let style = if field == app.flyout.field() {
			Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
		} else {
			Style::default()
		};
		lines.push(Line::from(vec![
			Span::styled(format!("{:<10} ", field.title()), style),
			Span::raw(value),
		]));
	}
	lines.push(Line::from(""));
	lines.push(Line::from(
		"Tab field | ←/→ label | ↑/↓ ±15 min | type to edit | Space toggle | Esc close",
	));

	let panel = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
		Block::default()
			.borders(Borders::ALL)
			.title(format!("Edit {} · {}", kind.title(), target.date.format("%a %d %b")))
			.border_style(border_style(true)),
	);
	frame.render_widget(panel, area);
}

fn render_select_popup(frame: &mut Frame, select: &SelectState) {
	let area = centered_rect(62, 55, frame.area());
	frame.render_widget(Clear, area);

	let items = if select.options.is_empty() {
		vec![ListItem::new("(no choices)")]
	} else {
		select
			.options
			.iter()
			.map(|option| ListItem::new(option.label.clone()))
			.collect::<Vec<_>>()
	};

	let current = if select.options.is_empty() {
		0
	} else {
		select.selected.saturating_add(1)
	};
	let total = select.options.len();
	let list = List::new(items)
		.block(
			Block::default()
				.borders(Borders::ALL)
				.title(format!("{} ({current}/{total})", select.title)),
		)
		.highlight_symbol(">> ")
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR));

	let mut state = ListState::default();
	if !select.options.is_empty() {
		state.select(Some(select.selected.min(select.options.len().saturating_sub(1))));
	}
	frame.render_stateful_widget(list, area, &mut state);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
	let popup_layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([
			Constraint::Percentage((100 - percent_y) / 2),
			Constraint::Percentage(percent_y),
			Constraint::Percentage((100 - percent_y) / 2),
		])
		.split(area);
	Layout::default()
		.direction(Direction::Horizontal)
		.constraints([
			Constraint::Percentage((100 - percent_x) / 2),
			Constraint::Percentage(percent_x),
			Constraint::Percentage((100 - percent_x) / 2),
		])
		.split(popup_layout[1])[1]
}

fn handle_mouse(
	app: &mut App,
	mouse: MouseEvent,
	layout: &DashboardLayout,
	store: &FileStore,
	planner: &mut Planner,
	progress: &mut Progress,
) {
	let y = f64::from(mouse.row) + 0.5;
	let events = match mouse.kind {
		MouseEventKind::Down(MouseButton::Left) => {
			if !matches!(app.mode, InputMode::Normal) {
				return;
			}
			// Rail clicks reach the editor even under an open flyout.
			if !app.flyout.is_open() && contains(layout.days, mouse.column, mouse.row) {
				let row = usize::from(mouse.row.saturating_sub(layout.days.y + 1));
				if let Some(day) = Day::ALL.get(row) {
					app.select_day(*day);
				}
				return;
			}
			if !contains(layout.rail, mouse.column, mouse.row) {
				return;
			}
			let props = planner.timeline_props(app.selected_day, Some(app.active_block));
			match app.editor.hit_test(y, &props) {
				Some((which, gesture)) => app.editor.pointer_down(which, gesture, y, &props),
				None => return,
			}
		}
		MouseEventKind::Drag(MouseButton::Left) if app.bus.is_captured() => {
			let props = planner.timeline_props(app.selected_day, Some(app.active_block));
			app.editor.pointer_move(y, &props)
		}
		MouseEventKind::Up(MouseButton::Left) if app.bus.is_captured() => app.editor.pointer_up(app.now_ms()),
		_ => return,
	};

	dispatch_timeline_events(app, events, store, planner, progress);
}

fn contains(area: Rect, column: u16, row: u16) -> bool {
	column >= area.x && column < area.x + area.width && row >= area.y && row < area.y + area.height
}

fn dispatch_timeline_events(
	app: &mut App,
	events: Vec<TimelineEvent>,
	store: &FileStore,
	planner: &mut Planner,
	progress: &mut Progress,
) {
	let day = app.selected_day;
	for event in events {
		match event {
			TimelineEvent::Change(patch) => {
				if planner.apply_patch(day, &patch) {
					app.report(save_week(store, planner, progress), "Saved");
				}
			}
			TimelineEvent::Select(kind) => {
				app.active_block = kind;
				app.focus = FocusPane::Timeline;
			}
			TimelineEvent::Edit(kind) => app.open_flyout(kind),
			TimelineEvent::FocusTimes(kind, field) => {
				app.open_flyout(kind);
				app.sync_flyout(planner);
				app.flyout.focus(match field {
					TimeField::End => FlyoutField::End,
					TimeField::Start | TimeField::Both => FlyoutField::Start,
				});
			}
			TimelineEvent::Nudge(kind, delta) => match planner.apply_nudge(day, kind, delta) {
				Some(_) => app.report(save_week(store, planner, progress), "Nudged"),
				None => app.status = format!("{} cannot move further", kind.title()),
			},
		}
	}
}

fn handle_flyout_key(
	app: &mut App,
	key: KeyEvent,
	store: &FileStore,
	planner: &mut Planner,
	progress: &mut Progress,
) {
	let Some(target) = app.flyout.target() else {
		return;
	};
	let Some(day) = planner.day_of(target.date) else {
		return;
	};

	let events = {
		let props = flyout_props(planner, day, target.kind);
		app.flyout.handle_key(key, &props)
	};

	for event in events {
		match event {
			FlyoutEvent::Change(patch) => {
				if planner.apply_patch(day, &patch) {
					app.report(save_week(store, planner, progress), "Saved");
				}
			}
			FlyoutEvent::EnsureActivity(name) => {
				if planner.ensure_activity(&name) {
					app.report(save_settings(store, planner.settings()), "Added activity");
				}
			}
			FlyoutEvent::Close => {
				app.flyout_open = false;
				app.status = "Closed editor".to_string();
			}
		}
	}
}

fn flyout_props(planner: &Planner, day: Day, kind: BlockKind) -> FlyoutProps<'_> {
	FlyoutProps {
		entry: planner.entry(day),
		settings: planner.settings(),
		suggested: planner.settings().suggested_slots.get(kind),
	}
}

fn handle_normal_key(
	app: &mut App,
	key: KeyEvent,
	store: &FileStore,
	planner: &mut Planner,
	progress: &mut Progress,
) -> bool {
	match key.code {
		KeyCode::Char('q') => return true,
		KeyCode::Right | KeyCode::Char('l') => app.focus = app.focus.next(),
		KeyCode::Left | KeyCode::Char('h') => app.focus = app.focus.prev(),
		KeyCode::Tab => {
			app.active_block = app.active_block.next();
			app.focus = FocusPane::Timeline;
		}
		KeyCode::Char('[') => change_week(app, store, planner, progress, -1),
		KeyCode::Char(']') => change_week(app, store, planner, progress, 1),
		KeyCode::Char('f') => {
			if planner.fill_blanks_with_defaults() {
				app.report(save_week(store, planner, progress), "Filled blank labels");
			} else {
				app.status = "Nothing to fill".to_string();
			}
		}
		KeyCode::Char('t') => {
			app.mode = InputMode::Prompt(PromptState::new("Template name", PromptKind::TemplateName, ""));
		}
		KeyCode::Char('a') => {
			let select = build_template_select(planner.settings());
			if select.options.is_empty() {
				app.status = "No templates yet, press t to capture one".to_string();
			} else {
				app.mode = InputMode::Select(select);
			}
		}
		KeyCode::Char('+') | KeyCode::Char('=') => set_mood(app, store, planner, progress, 1),
		KeyCode::Char('-') => set_mood(app, store, planner, progress, -1),
		KeyCode::Enter => match app.focus {
			FocusPane::Days | FocusPane::Timeline => app.open_flyout(app.active_block),
			FocusPane::Fields => edit_day_field(app, store, planner, progress),
		},
		KeyCode::Up | KeyCode::Down | KeyCode::Char('k') | KeyCode::Char('j') => {
			let delta = if matches!(key.code, KeyCode::Up | KeyCode::Char('k')) { -1 } else { 1 };
			match app.focus {
				FocusPane::Days => {
					let index = (app.selected_day.index() as i32 + delta).clamp(0, 6) as usize;
					app.select_day(Day::ALL[index]);
				}
				FocusPane::Timeline => {
					let arrow = KeyEvent::new(
						if delta < 0 { KeyCode::Up } else { KeyCode::Down },
						key.modifiers,
					);
					let events = {
						let props = planner.timeline_props(app.selected_day, Some(app.active_block));
						app.editor.key_down(app.active_block, arrow, &props)
					};
					dispatch_timeline_events(app, events, store, planner, progress);
				}
				FocusPane::Fields => app.day_field = app.day_field.step(delta),
			}
		}
		_ => {}
	}

	false
}

fn change_week(app: &mut App, store: &FileStore, planner: &mut Planner, progress: &mut Progress, weeks: i64) {
	let next = shift_week(planner.week_start(), weeks);
	match load_week(store, next) {
		Ok(week) => {
			planner.replace_week(next, week);
			app.flyout_open = false;
			app.status = format!("Week of {}", next.format("%d %b %Y"));
			fill_blank_week(app, store, planner, progress);
		}
		Err(err) => {
			error!(%err, "failed to load week");
			app.status = format!("error: {err}");
		}
	}
}

/// A week opened with no labels at all starts from the defaults.
fn fill_blank_week(app: &mut App, store: &FileStore, planner: &mut Planner, progress: &mut Progress) {
	if planner.has_no_labels() && planner.fill_blanks_with_defaults() {
		let done = format!("Week of {} filled with defaults", planner.week_start().format("%d %b %Y"));
		app.report(save_week(store, planner, progress), &done);
	}
}

fn set_mood(app: &mut App, store: &FileStore, planner: &mut Planner, progress: &mut Progress, delta: i32) {
	let current = planner.entry(app.selected_day).mood;
	let next = match (current, delta) {
		(None, delta) if delta > 0 => Some(1),
		(None, _) => None,
		(Some(1), delta) if delta < 0 => None,
		(Some(mood), delta) => Some((i32::from(mood) + delta).clamp(1, 5) as u8),
	};
	let patch = DayPatch {
		mood: Some(next),
		..DayPatch::default()
	};
	if planner.apply_patch(app.selected_day, &patch) {
		app.report(save_week(store, planner, progress), "Mood saved");
	}
}

fn edit_day_field(app: &mut App, store: &FileStore, planner: &mut Planner, progress: &mut Progress) {
	let entry = planner.entry(app.selected_day);
	match app.day_field {
		DayField::Gratitude => {
			app.mode = InputMode::Prompt(PromptState::new("Gratitude", PromptKind::Gratitude, &entry.gratitude));
		}
		DayField::Notes => {
			app.mode = InputMode::Prompt(PromptState::new("Day notes", PromptKind::DayNotes, &entry.notes));
		}
		DayField::Mood => set_mood(app, store, planner, progress, 1),
		DayField::Therapy => {
			let patch = DayPatch {
				therapy: Some(!entry.therapy),
				..DayPatch::default()
			};
			if planner.apply_patch(app.selected_day, &patch) {
				app.report(save_week(store, planner, progress), "Saved");
			}
		}
	}
}

fn handle_prompt_key(
	app: &mut App,
	code: KeyCode,
	store: &FileStore,
	planner: &mut Planner,
	progress: &mut Progress,
) -> bool {
	match code {
		KeyCode::Esc => {
			app.mode = InputMode::Normal;
			app.status = "Input cancelled".to_string();
		}
		KeyCode::Backspace => {
			if let InputMode::Prompt(prompt) = &mut app.mode {
				prompt.input.pop();
			}
		}
		KeyCode::Char(value) => {
			if let InputMode::Prompt(prompt) = &mut app.mode {
				prompt.input.push(value);
			}
		}
		KeyCode::Enter => {
			let prompt = match std::mem::replace(&mut app.mode, InputMode::Normal) {
				InputMode::Prompt(prompt) => prompt,
				InputMode::Normal | InputMode::Select(_) => return false,
			};

			match submit_prompt(prompt.clone(), app.selected_day, store, planner, progress) {
				Ok(message) => app.status = message,
				Err(err) => {
					app.mode = InputMode::Prompt(prompt);
					app.status = format!("error: {err}");
				}
			}
		}
		_ => {}
	}

	false
}

fn handle_select_key(
	app: &mut App,
	code: KeyCode,
	store: &FileStore,
	planner: &mut Planner,
	progress: &mut Progress,
) -> bool {
	match code {
		KeyCode::Esc => {
			app.mode = InputMode::Normal;
			app.status = "Selection cancelled".to_string();
		}
		KeyCode::Up | KeyCode::Char('k') => {
			if let InputMode::Select(select) = &mut app.mode {
				select.move_selection(-1);
			}
		}
		KeyCode::Down | KeyCode::Char('j') => {
			if let InputMode::Select(select) = &mut app.mode {
				select.move_selection(1);
			}
		}
		KeyCode::Enter => {
			let select = match std::mem::replace(&mut app.mode, InputMode::Normal) {
				InputMode::Select(select) => select,
				_ => return false,
			};

			match submit_select(select.clone(), store, planner, progress) {
				Ok(SelectOutcome::NextSelect(next_select)) => app.mode = InputMode::Select(next_select),
				Ok(SelectOutcome::Done(message)) => {
					app.mode = InputMode::Normal;
					app.status = message;
				}
				Err(err) => {
					app.mode = InputMode::Select(select);
					app.status = format!("error: {err}");
				}
			}
		}
		_ => {}
	}

	false
}

fn submit_prompt(
	prompt: PromptState,
	day: Day,
	store: &FileStore,
	planner: &mut Planner,
	progress: &mut Progress,
) -> Result<String, String> {
	match prompt.kind {
		PromptKind::Gratitude => {
			let patch = DayPatch {
				gratitude: Some(prompt.input),
				..DayPatch::default()
			};
			planner.apply_patch(day, &patch);
			save_week(store, planner, progress)?;
			Ok("Gratitude saved".to_string())
		}
		PromptKind::DayNotes => {
			let patch = DayPatch {
				notes: Some(prompt.input),
				..DayPatch::default()
			};
			planner.apply_patch(day, &patch);
			save_week(store, planner, progress)?;
			Ok("Notes saved".to_string())
		}
		PromptKind::TemplateName => {
			let name = required_text(&prompt.input, "template name")?;
			let template = planner.capture_template(&CaptureOptions {
				name,
				scope: TemplateScope::Entire,
				include_notes: false,
			});
			save_settings(store, planner.settings())?;
			Ok(format!("captured template {} ({})", template.name, template.id))
		}
	}
}

fn submit_select(
	select: SelectState,
	store: &FileStore,
	planner: &mut Planner,
	progress: &mut Progress,
) -> Result<SelectOutcome, String> {
	let selected_value = select
		.selected_option()
		.map(|option| option.value.clone())
		.ok_or_else(|| "no option selected".to_string())?;

	match select.kind {
		SelectKind::Template => Ok(SelectOutcome::NextSelect(build_apply_mode_select(selected_value))),
		SelectKind::ApplyMode { template_id } => {
			let overwrite = selected_value == "overwrite";
			let scope = planner
				.settings()
				.templates
				.iter()
				.find(|template| template.id == template_id)
				.map(|template| template.scope)
				.unwrap_or_default();
			let name = planner
				.apply_template(&template_id, ApplyOptions { overwrite, scope })
				.map(|template| template.name.clone())
				.ok_or_else(|| format!("unknown template {template_id}"))?;
			save_week(store, planner, progress)?;
			Ok(SelectOutcome::Done(format!(
				"applied {name} ({})",
				if overwrite { "overwrite" } else { "fill blanks" }
			)))
		}
	}
}

fn build_template_select(settings: &Settings) -> SelectState {
	let options = settings
		.templates
		.iter()
		.map(|template| {
			SelectOption::new(
				format!("{} · {} · {} days", template.name, template.scope, template.days.len()),
				template.id.clone(),
			)
		})
		.collect();
	SelectState::new("Apply template", SelectKind::Template, options)
}

fn build_apply_mode_select(template_id: String) -> SelectState {
	SelectState::new(
		"Apply mode",
		SelectKind::ApplyMode { template_id },
		vec![
			SelectOption::new("Fill blanks only", "fill".to_string()),
			SelectOption::new("Overwrite matching fields", "overwrite".to_string()),
		],
	)
}

fn save_week(store: &FileStore, planner: &Planner, progress: &mut Progress) -> Result<(), String> {
	save_week_with_progress(store, &planner.payload(Utc::now()), progress, Local::now().date_naive())
		.map_err(|err| err.to_string())
}

fn save_settings(store: &FileStore, settings: &Settings) -> Result<(), String> {
	store.save_settings(settings).map_err(|err| err.to_string())
}

fn required_text(input: &str, field_name: &str) -> Result<String, String> {
	let trimmed = input.trim();
	if trimmed.is_empty() {
		Err(format!("{field_name} cannot be empty"))
	} else {
		Ok(trimmed.to_string())
	}
}

/// Settings store colours as `#rgb`, `#rrggbb` or a terminal colour name.
fn color_from_setting(value: &str) -> Option<Color> {
	let value = value.trim();
	if let Some(hex) = value.strip_prefix('#') {
		if !hex.is_ascii() {
			return None;
		}
		let expand = |digit: &str| u8::from_str_radix(digit, 16).ok().map(|value| value * 17);
		let pair = |digits: &str| u8::from_str_radix(digits, 16).ok();
		return match hex.len() {
			3 => Some(Color::Rgb(expand(&hex[0..1])?, expand(&hex[1..2])?, expand(&hex[2..3])?)),
			6 => Some(Color::Rgb(pair(&hex[0..2])?, pair(&hex[2..4])?, pair(&hex[4..6])?)),
			_ => None,
		};
	}

	match value {
		"black" => Some(Color::Black),
		"red" => Some(Color::Red),
		"green" => Some(Color::Green),
		"yellow" => Some(Color::Yellow),
		"blue" => Some(Color::Blue),
		"magenta" => Some(Color::Magenta),
		"cyan" => Some(Color::Cyan),
		"gray" => Some(Color::Gray),
		"white" => Some(Color::White),
		_ => None,
	}
}

fn block_color(kind: BlockKind, label: &str, settings: &Settings) -> Color {
	match kind {
		BlockKind::Morning => Color::LightBlue,
		BlockKind::Midday => Color::LightMagenta,
		BlockKind::Activity => settings
			.activity_colors
			.get(label)
			.and_then(|value| color_from_setting(value))
			.unwrap_or(Color::LightGreen),
	}
}

fn border_style(focused: bool) -> Style {
	if focused {
		Style::default()
			.fg(FOCUSED_PANEL_BORDER_COLOR)
			.add_modifier(Modifier::BOLD)
	} else {
		Style::default().fg(INACTIVE_PANEL_BORDER_COLOR)
	}
}

#[derive(Debug, Clone)]
enum SelectOutcome {
	NextSelect(SelectState),
	Done(String),
}

#[derive(Debug, Clone)]
struct PromptState {
	title: String,
	input: String,
	kind: PromptKind,
}

impl PromptState {
	fn new(title: impl Into<String>, kind: PromptKind, input: &str) -> Self {
		Self {
			title: title.into(),
			input: input.to_string(),
			kind,
		}
	}
}

#[derive(Debug, Clone)]
struct SelectState {
	title: String,
	options: Vec<SelectOption>,
	selected: usize,
	kind: SelectKind,
}

impl SelectState {
	fn new(title: impl Into<String>, kind: SelectKind, options: Vec<SelectOption>) -> Self {
		Self {
			title: title.into(),
			options,
			selected: 0,
			kind,
		}
	}

	fn move_selection(&mut self, delta: i32) {
		if self.options.is_empty() {
			self.selected = 0;
			return;
		}

		if delta > 0 {
			self.selected = (self.selected + delta as usize).min(self.options.len() - 1);
		} else {
			self.selected = self.selected.saturating_sub(delta.unsigned_abs() as usize);
		}
	}

	fn selected_option(&self) -> Option<&SelectOption> {
		self.options.get(self.selected)
	}
}

#[derive(Debug, Clone)]
struct SelectOption {
	label: String,
	value: String,
}

impl SelectOption {
	fn new(label: impl Into<String>, value: String) -> Self {
		Self {
			label: label.into(),
			value,
		}
	}
}

#[derive(Debug, Clone)]
enum PromptKind {
	Gratitude,
	DayNotes,
	TemplateName,
}

#[derive(Debug, Clone)]
enum SelectKind {
	Template,
	ApplyMode { template_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FocusPane {
	Days,
	Timeline,
	Fields,
}

impl FocusPane {
	fn next(self) -> Self {
		match self {
			FocusPane::Days => FocusPane::Timeline,
			FocusPane::Timeline => FocusPane::Fields,
			FocusPane::Fields => FocusPane::Days,
		}
	}

	fn prev(self) -> Self {
		match self {
			FocusPane::Days => FocusPane::Fields,
			FocusPane::Timeline => FocusPane::Days,
			FocusPane::Fields => FocusPane::Timeline,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DayField {
	Gratitude,
	Notes,
	Mood,
	Therapy,
}

impl DayField {
	const ALL: [DayField; 4] = [DayField::Gratitude, DayField::Notes, DayField::Mood, DayField::Therapy];

	fn step(self, delta: i32) -> Self {
		let index = Self::ALL.iter().position(|field| *field == self).unwrap_or(0) as i32;
		Self::ALL[(index + delta).clamp(0, Self::ALL.len() as i32 - 1) as usize]
	}
}

#[derive(Debug, Clone)]
enum InputMode {
	Normal,
	Prompt(PromptState),
	Select(SelectState),
}

struct App {
	focus: FocusPane,
	selected_day: Day,
	active_block: BlockKind,
	day_field: DayField,
	mode: InputMode,
	status: String,
	bus: PointerBus,
	editor: TimelineEditor,
	flyout: BlockFlyout,
	flyout_open: bool,
	flyout_kind: BlockKind,
	started: Instant,
}

impl App {
	fn new(window: TimelineWindow) -> Self {
		let bus = PointerBus::new();
		let today = Day::from_weekday(Local::now().date_naive().weekday());
		Self {
			focus: FocusPane::Timeline,
			selected_day: today,
			active_block: BlockKind::Morning,
			day_field: DayField::Gratitude,
			mode: InputMode::Normal,
			status: "Ready".to_string(),
			editor: TimelineEditor::new(Rail::for_window(&window), bus.clone()),
			bus,
			flyout: BlockFlyout::new(),
			flyout_open: false,
			flyout_kind: BlockKind::Morning,
			started: Instant::now(),
		}
	}

	fn now_ms(&self) -> u64 {
		u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
	}

	fn select_day(&mut self, day: Day) {
		self.selected_day = day;
		self.focus = FocusPane::Days;
		self.editor.pointer_leave();
	}

	fn open_flyout(&mut self, kind: BlockKind) {
		self.active_block = kind;
		self.flyout_kind = kind;
		self.flyout_open = true;
	}

	/// Hands the flyout its current open flag and target.
	fn sync_flyout(&mut self, planner: &Planner) {
		let day = self.selected_day;
		let target = FlyoutTarget {
			date: planner.date_of(day),
			kind: self.flyout_kind,
		};
		let props = flyout_props(planner, day, self.flyout_kind);
		self.flyout.sync(self.flyout_open, Some(target), &props);
	}

	fn report(&mut self, result: Result<(), String>, done: &str) {
		match result {
			Ok(()) => self.status = done.to_string(),
			Err(err) => {
				warn!(%err, "save failed");
				self.status = format!("error: {err}");
			}
		}
	}
}
