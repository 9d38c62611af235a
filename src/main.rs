use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration as StdDuration;

use chrono::{NaiveDate, Weekday};
use clap::{Parser, Subcommand, ValueEnum};
use rand::seq::SliceRandom;
use tracing::info;

use task_timer::config::Settings;
use task_timer::domain::{Task, random_color};
use task_timer::paths::{resolve_config_path, resolve_save_path};
use task_timer::time_format::{format_clock, format_running, parse_time_input};
use task_timer::{Autosave, Direction, StoreEvent, TaskId, TaskStore};

#[derive(Debug, Parser)]
#[command(name = "task-timer", about = "Daily task timers with a rolling weekly ledger")]
struct Cli {
	#[arg(long)]
	file: Option<PathBuf>,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	Init,
	/// Add a timer task; time is `mm:ss` or whole minutes.
	Add {
		name: String,
		time: String,
	},
	AddChecklist {
		name: String,
		boxes: usize,
	},
	List,
	Start {
		task: TaskId,
	},
	Stop {
		task: TaskId,
		#[arg(long)]
		round_up: bool,
	},
	Restart {
		task: TaskId,
	},
	Toggle {
		task: TaskId,
		index: usize,
	},
	Delete {
		task: TaskId,
	},
	Move {
		task: TaskId,
		direction: MoveArg,
	},
	/// Hex color, palette index, or nothing for a random color.
	Color {
		task: TaskId,
		color: Option<String>,
	},
	Describe {
		task: TaskId,
		text: String,
	},
	RoundUp {
		task: TaskId,
		minutes: u32,
	},
	Link {
		task: TaskId,
		url: Option<String>,
	},
	Plan {
		task: TaskId,
		time: String,
	},
	Week {
		task: TaskId,
	},
	History {
		day: Option<String>,
	},
	/// Tick running timers once per second in the foreground.
	Run {
		#[arg(long)]
		seconds: Option<u64>,
	},
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MoveArg {
	Up,
	Down,
}

impl From<MoveArg> for Direction {
	fn from(value: MoveArg) -> Self {
		match value {
			MoveArg::Up => Direction::Up,
			MoveArg::Down => Direction::Down,
		}
	}
}

const WEEK_MONDAY_FIRST: [(Weekday, &str); 7] = [
	(Weekday::Mon, "Mon"),
	(Weekday::Tue, "Tue"),
	(Weekday::Wed, "Wed"),
	(Weekday::Thu, "Thu"),
	(Weekday::Fri, "Fri"),
	(Weekday::Sat, "Sat"),
	(Weekday::Sun, "Sun"),
];

fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.with_writer(io::stderr)
		.init();

	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();
	let settings = Settings::load(&resolve_config_path())?;
	let save_path = resolve_save_path(cli.file, &settings);

	let mut store = TaskStore::load(&save_path)?;
	store.set_default_round_up(settings.default_round_up_minutes)?;

	match cli.command.unwrap_or(Command::List) {
		Command::Init => {
			println!("initialized task list at {}", save_path.display());
		}
		Command::Add { name, time } => {
			let planned = parse_time(&time)?;
			let id = store.create_task(&name, planned)?;
			println!("created task {id}");
		}
		Command::AddChecklist { name, boxes } => {
			let id = store.create_checklist(&name, boxes)?;
			println!("created checklist {id}");
		}
		Command::List => {
			print_tasks(&store);
			return Ok(());
		}
		Command::Start { task } => {
			report(store.start(task)?, "started", "already running", task);
		}
		Command::Stop { task, round_up } => {
			let stopped = if round_up {
				store.stop_with_round_up(task)?
			} else {
				store.pause(task)?
			};
			report(stopped, "stopped", "not running", task);
		}
		Command::Restart { task } => {
			store.restart(task)?;
			println!("restarted {task}");
		}
		Command::Toggle { task, index } => {
			let checked = store.toggle_checkbox(task, index)?;
			println!("box {index} of {task} is now {}", if checked { "checked" } else { "unchecked" });
		}
		Command::Delete { task } => {
			let removed = store.delete_task(task)?;
			println!("deleted {}", removed.name());
		}
		Command::Move { task, direction } => {
			if !store.move_task(task, direction.into())? {
				println!("{task} is already at the edge of the list");
			}
		}
		Command::Color { task, color } => {
			let color = pick_color(color, &settings)?;
			store.set_color(task, &color)?;
			println!("{task} is now {color}");
		}
		Command::Describe { task, text } => {
			store.set_description(task, &text)?;
		}
		Command::RoundUp { task, minutes } => {
			store.set_round_up(task, minutes)?;
		}
		Command::Link { task, url } => {
			store.set_link(task, url.as_deref())?;
		}
		Command::Plan { task, time } => {
			store.set_planned(task, parse_time(&time)?)?;
		}
		Command::Week { task } => {
			print_week(&store, task)?;
			return Ok(());
		}
		Command::History { day } => {
			print_history(&store, day.as_deref())?;
			return Ok(());
		}
		Command::Run { seconds } => {
			let mut autosave = Autosave::new(save_path.clone(), settings.autosave_interval_secs);
			run_scheduler(&mut store, &mut autosave, seconds)?;
			return Ok(());
		}
	}

	store.save(&save_path)?;
	Ok(())
}

fn run_scheduler(
	store: &mut TaskStore,
	autosave: &mut Autosave,
	seconds: Option<u64>,
) -> Result<(), Box<dyn Error>> {
	info!(path = %autosave.path().display(), "scheduler started");
	let mut elapsed = 0;
	while seconds.is_none_or(|limit| elapsed < limit) {
		thread::sleep(StdDuration::from_secs(1));
		store.tick();
		elapsed += 1;

		for event in store.drain_events() {
			print_event(store, &event);
		}
		autosave.tick(store);
	}

	println!();
	autosave.flush(store)?;
	Ok(())
}

fn print_event(store: &TaskStore, event: &StoreEvent) {
	match event {
		StoreEvent::PlannedReached { name, planned, .. } => {
			println!("\nplanned time ({planned}) of {name} reached");
		}
		StoreEvent::TotalsChanged(totals) => {
			let running = store
				.running_task()
				.map(|record| {
					format!(
						"{} {}/{}",
						record.name,
						format_running(record.curr_time),
						format_running(record.planned)
					)
				})
				.unwrap_or_else(|| "idle".to_string());
			print!("\r{totals} | {running}   ");
			let _ = io::stdout().flush();
		}
		StoreEvent::ListChanged => {
			println!("\ntask list changed");
		}
	}
}

fn report(changed: bool, done: &str, skipped: &str, task: TaskId) {
	if changed {
		println!("{done} {task}");
	} else {
		println!("{task} {skipped}");
	}
}

fn parse_time(input: &str) -> Result<u64, Box<dyn Error>> {
	let seconds = parse_time_input(input)
		.ok_or_else(|| format!("invalid time: {input:?} (use mm:ss or minutes)"))?;
	Ok(seconds)
}

fn parse_day(input: &str) -> Result<NaiveDate, Box<dyn Error>> {
	Ok(NaiveDate::parse_from_str(input, "%Y-%m-%d")?)
}

fn pick_color(input: Option<String>, settings: &Settings) -> Result<String, Box<dyn Error>> {
	let Some(input) = input else {
		return Ok(settings
			.palette
			.choose(&mut rand::thread_rng())
			.cloned()
			.unwrap_or_else(random_color));
	};

	let Ok(index) = input.parse::<usize>() else {
		return Ok(input);
	};
	let color = settings
		.palette
		.get(index)
		.cloned()
		.ok_or_else(|| format!("palette has {} colors, no color {index}", settings.palette.len()))?;
	Ok(color)
}

fn print_tasks(store: &TaskStore) {
	if store.tasks().is_empty() {
		println!("no tasks yet");
		return;
	}

	for task in store.tasks() {
		println!("{}", task_line(task));
	}
	println!("total {}", store.totals());
}

fn task_line(task: &Task) -> String {
	match task {
		Task::Timer(record) => {
			let mut flags = Vec::new();
			if record.running {
				flags.push("running".to_string());
			}
			if record.is_overtime() {
				flags.push("overtime".to_string());
			}
			if record.round_up_minutes > 0 {
				flags.push(format!("round-up {}m", record.round_up_minutes));
			}
			format!(
				"{:>3} | {} | {} / {} ({:.0}%) | {} | {}",
				record.id,
				record.name,
				format_clock(record.curr_time),
				format_clock(record.planned),
				record.progress() * 100.0,
				record.color,
				flags.join(", ")
			)
		}
		Task::Checklist(record) => {
			let boxes = record
				.checked
				.iter()
				.map(|checked| if *checked { "[x]" } else { "[ ]" })
				.collect::<String>();
			format!("{:>3} | {} | {} | {}", record.id, record.name, boxes, record.color)
		}
	}
}

fn print_week(store: &TaskStore, id: TaskId) -> Result<(), Box<dyn Error>> {
	let record = store
		.task(id)
		.and_then(Task::as_timer)
		.ok_or_else(|| format!("no timer task {id}"))?;

	println!("{} ({})", record.name, record.description);
	if let Some(link) = &record.link {
		println!("{link}");
	}
	println!("day | current | planned | last stop");
	for (weekday, label) in WEEK_MONDAY_FIRST {
		let day = record.weekdays.day(weekday);
		let last_stop = day.last_stop.map(format_clock).unwrap_or_else(|| "-".to_string());
		println!(
			"{label} | {} | {} | {last_stop}",
			format_clock(day.current),
			format_clock(day.planned)
		);
	}

	let total = record.weekdays.aggregate_total();
	let (current, planned) = total.split_once('\n').unwrap_or((total.as_str(), ""));
	println!("Total | {current} | {planned}");
	Ok(())
}

fn print_history(store: &TaskStore, day: Option<&str>) -> Result<(), Box<dyn Error>> {
	let Some(day) = day else {
		if store.history().is_empty() {
			println!("no history yet");
		}
		for (date, tasks) in store.history() {
			println!("{} | {} tasks", date.format("%Y-%m-%d"), tasks.len());
		}
		return Ok(());
	};

	let day = parse_day(day)?;
	let tasks = store
		.history()
		.get(&day)
		.ok_or_else(|| format!("no history for {day}"))?;
	for task in tasks {
		println!("{}", task_line(task));
	}
	Ok(())
}
