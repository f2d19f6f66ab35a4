mod config;
mod domain;
mod flyout;
mod logging;
mod paths;
mod planner;
mod reconcile;
mod storage;
mod templates;
mod time_codec;
mod timeline;
mod ui;

use std::error::Error;
use std::path::PathBuf;

use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::domain::{BlockKind, Day, DayPatch, TimeRange};
use crate::logging::LogTarget;
use crate::paths::{log_path, resolve_config_path, resolve_store_dir};
use crate::planner::{Planner, Progress};
use crate::storage::{
	ExportBundle, FileStore, StorageProvider, export_bundle, import_bundle, load_settings, load_week,
	save_week_with_progress,
};
use crate::templates::{ApplyOptions, CaptureOptions, DEFAULT_TEMPLATE_NAME, TemplateScope};
use crate::time_codec::{format_time, parse_strict};
use crate::timeline::{GestureKind, commit_range};
use crate::ui::run_dashboard;

#[derive(Debug, Parser)]
#[command(name = "weekblocks", about = "Weekly planner for three daily habit blocks")]
struct Cli {
	#[arg(long)]
	store: Option<PathBuf>,
	#[arg(long)]
	config: Option<PathBuf>,
	/// Any date inside the week to work on (YYYY-MM-DD). Defaults to today.
	#[arg(long, global = true)]
	week: Option<String>,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	Init,
	Dashboard,
	Show,
	SetBlock {
		#[arg(long)]
		day: Day,
		#[arg(long)]
		block: BlockKind,
		#[arg(long)]
		start: String,
		#[arg(long)]
		end: String,
	},
	Done {
		#[arg(long)]
		day: Day,
		#[arg(long)]
		block: BlockKind,
		#[arg(long)]
		undo: bool,
	},
	CaptureTemplate {
		#[arg(long, default_value = DEFAULT_TEMPLATE_NAME)]
		name: String,
		#[arg(long, default_value_t = TemplateScope::Entire)]
		scope: TemplateScope,
		#[arg(long)]
		include_notes: bool,
	},
	ApplyTemplate {
		#[arg(long)]
		id: String,
		#[arg(long)]
		overwrite: bool,
		#[arg(long)]
		scope: Option<TemplateScope>,
	},
	Templates,
	Export {
		#[arg(long)]
		out: PathBuf,
	},
	Import {
		#[arg(long)]
		file: PathBuf,
	},
	FillBlanks,
}

fn main() {
	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();
	let command = cli.command.unwrap_or(Command::Dashboard);

	let config_path = resolve_config_path(cli.config);
	let mut config = AppConfig::load(&config_path)?;
	let target = match command {
		Command::Dashboard => LogTarget::File(log_path()),
		_ => LogTarget::Stderr,
	};
	if let Err(err) = logging::init(target, config.log_filter.as_deref()) {
		eprintln!("warning: failed to start logging: {err}");
	}
	config.correct_window();

	let store = FileStore::new(resolve_store_dir(cli.store, config.store_dir.as_deref()));
	debug!(store = %store.root().display(), config = %config_path.display(), "resolved paths");

	let today = Local::now().date_naive();
	let week_start = parse_week(cli.week.as_deref(), today)?;
	let settings = load_settings(&store)?;
	let week = load_week(&store, week_start)?;
	let mut planner = Planner::new(week_start, week, settings, config.timeline, config.prevent_overlap);
	let mut progress = store.load_progress()?;

	match command {
		Command::Init => {
			if !config_path.exists() {
				config.save(&config_path)?;
				println!("wrote config to {}", config_path.display());
			}
			store.save_settings(planner.settings())?;
			println!("initialized store at {}", store.root().display());
		}
		Command::Dashboard => {
			run_dashboard(&store, &mut planner, &mut progress)?;
		}
		Command::Show => {
			print_week(&planner, &progress, today);
		}
		Command::SetBlock {
			day,
			block,
			start,
			end,
		} => {
			let start = parse_strict(&start).ok_or_else(|| format!("invalid start time: {start}"))?;
			let end = parse_strict(&end).ok_or_else(|| format!("invalid end time: {end}"))?;
			if end <= start {
				return Err("end must be after start".into());
			}

			let committed = {
				let props = planner.timeline_props(day, Some(block));
				commit_range(
					block,
					GestureKind::ResizeEnd,
					TimeRange::new(start, end),
					&props.ranges(),
					&props.window,
					props.prevent_overlap,
				)
			};
			let patch = DayPatch::times(block, format_time(committed.start), format_time(committed.end));
			planner.apply_patch(day, &patch);
			save(&store, &planner, &mut progress, today)?;
			println!(
				"{} {}: {}-{}",
				day,
				block.title(),
				format_time(committed.start),
				format_time(committed.end)
			);
		}
		Command::Done { day, block, undo } => {
			planner.apply_patch(day, &DayPatch::done(block, !undo));
			save(&store, &planner, &mut progress, today)?;
			let count = planner.objectives(day);
			println!("{} {}/{} ({}%)", day, count.completed, count.total, count.pct);
		}
		Command::CaptureTemplate {
			name,
			scope,
			include_notes,
		} => {
			let template = planner.capture_template(&CaptureOptions {
				name,
				scope,
				include_notes,
			});
			store.save_settings(planner.settings())?;
			println!("captured template {} ({})", template.name, template.id);
		}
		Command::ApplyTemplate { id, overwrite, scope } => {
			let scope = match scope {
				Some(scope) => scope,
				None => planner
					.settings()
					.templates
					.iter()
					.find(|template| template.id == id)
					.map(|template| template.scope)
					.ok_or_else(|| format!("unknown template {id}"))?,
			};
			let name = planner
				.apply_template(&id, ApplyOptions { overwrite, scope })
				.map(|template| template.name.clone())
				.ok_or_else(|| format!("unknown template {id}"))?;
			save(&store, &planner, &mut progress, today)?;
			println!("applied {name} to week of {}", planner.week_start());
		}
		Command::Templates => {
			if planner.settings().templates.is_empty() {
				println!("no templates yet");
			}
			for template in &planner.settings().templates {
				println!(
					"{} | {} | {} | {} days",
					template.id,
					template.name,
					template.scope,
					template.days.len()
				);
			}
		}
		Command::Export { out } => {
			let bundle = ExportBundle {
				week_start: planner.week_start(),
				week: planner.week().clone(),
				settings: planner.settings().clone(),
			};
			export_bundle(&out, &bundle)?;
			println!("exported week of {} to {}", bundle.week_start, out.display());
		}
		Command::Import { file } => {
			let bundle = import_bundle(&file)?;
			let settings = bundle.settings.with_defaults();
			store.save_settings(&settings)?;
			planner.replace_settings(settings);
			planner.replace_week(bundle.week_start, bundle.week);
			save(&store, &planner, &mut progress, today)?;
			info!(week = %planner.week_start(), "imported bundle");
			println!("imported week of {} from {}", planner.week_start(), file.display());
		}
		Command::FillBlanks => {
			if planner.fill_blanks_with_defaults() {
				save(&store, &planner, &mut progress, today)?;
				println!("filled blank labels");
			} else {
				println!("nothing to fill");
			}
		}
	}

	Ok(())
}

fn save(store: &FileStore, planner: &Planner, progress: &mut Progress, today: NaiveDate) -> Result<(), Box<dyn Error>> {
	save_week_with_progress(store, &planner.payload(Utc::now()), progress, today)?;
	Ok(())
}

fn parse_week(input: Option<&str>, today: NaiveDate) -> Result<NaiveDate, Box<dyn Error>> {
	if let Some(raw) = input {
		Ok(NaiveDate::parse_from_str(raw, "%Y-%m-%d")?)
	} else {
		Ok(today)
	}
}

fn print_week(planner: &Planner, progress: &Progress, today: NaiveDate) {
	println!("week of {}", planner.week_start().format("%Y-%m-%d"));

	for day in Day::ALL {
		let entry = planner.entry(day);
		let count = planner.objectives(day);
		println!(
			"\n{} {} | {}/{} ({}%)",
			day,
			planner.date_of(day).format("%Y-%m-%d"),
			count.completed,
			count.total,
			count.pct
		);

		let ranges = planner.timeline_props(day, None).ranges();
		for block in BlockKind::ALL {
			let range = ranges.get(block);
			let label = entry.label(block);
			let emoji = planner
				.settings()
				.emoji_for(block, label)
				.map(|emoji| format!("{emoji} "))
				.unwrap_or_default();
			println!(
				"  [{}] {:<8} {}-{} {}{}",
				if entry.done(block) { "x" } else { " " },
				block.title(),
				format_time(range.start),
				format_time(range.end),
				emoji,
				if label.is_empty() { "-" } else { label }
			);
		}
		if !ranges.is_ordered() {
			println!("  (blocks overlap)");
		}

		if !entry.gratitude.is_empty() {
			println!("  gratitude: {}", entry.gratitude);
		}
		if !entry.notes.is_empty() {
			println!("  notes: {}", entry.notes);
		}
		if let Some(mood) = entry.mood {
			println!("  mood: {mood}/5");
		}
		if entry.therapy {
			println!("  therapy: yes");
		}
	}

	println!(
		"\ncompletion: {:.0}% | streak: {} (best {})",
		planner.weekly_completion() * 100.0,
		progress.current_streak(today),
		progress.best_streak
	);
}

#[cfg(test)]
mod tests {
	use chrono::NaiveDate;
	use clap::Parser;

	use crate::domain::{BlockKind, Day};
	use crate::templates::TemplateScope;

	use super::{Cli, Command, parse_week};

	#[test]
	fn set_block_arguments_parse() {
		let cli = Cli::try_parse_from([
			"weekblocks",
			"--store",
			"/tmp/blocks",
			"set-block",
			"--day",
			"tue",
			"--block",
			"activity",
			"--start",
			"18:00",
			"--end",
			"19:30",
		])
		.expect("parse");
		match cli.command {
			Some(Command::SetBlock { day, block, start, end }) => {
				assert_eq!(day, Day::Tuesday);
				assert_eq!(block, BlockKind::Activity);
				assert_eq!(start, "18:00");
				assert_eq!(end, "19:30");
			}
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn week_flag_is_accepted_after_the_command() {
		let cli = Cli::try_parse_from(["weekblocks", "show", "--week", "2025-03-12"]).expect("parse");
		assert!(matches!(cli.command, Some(Command::Show)));
		let today = NaiveDate::from_ymd_opt(2025, 1, 1).expect("date");
		assert_eq!(
			parse_week(cli.week.as_deref(), today).expect("week"),
			NaiveDate::from_ymd_opt(2025, 3, 12).expect("date")
		);
		assert_eq!(parse_week(None, today).expect("week"), today);
		assert!(parse_week(Some("12/03/2025"), today).is_err());
	}

	#[test]
	fn capture_template_defaults() {
		let cli = Cli::try_parse_from(["weekblocks", "capture-template"]).expect("parse");
		match cli.command {
			Some(Command::CaptureTemplate {
				name,
				scope,
				include_notes,
			}) => {
				assert_eq!(name, "My Template");
				assert_eq!(scope, TemplateScope::Entire);
				assert!(!include_notes);
			}
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn no_command_means_dashboard() {
		let cli = Cli::try_parse_from(["weekblocks"]).expect("parse");
		assert!(cli.command.is_none());
	}
}
