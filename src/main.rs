use std::env;
use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::warn;

use pipeline_calendar::analytics::aggregate;
use pipeline_calendar::config::CalendarConfig;
use pipeline_calendar::detail::{ApplicationSink, DetailScope, DetailView, export_csv, summary_text};
use pipeline_calendar::domain::{
	ApplicationPatch, ApplicationStatus, DateRange, NewApplication, StatusFilter, parse_day,
	parse_timestamp, today,
};
use pipeline_calendar::error::CalendarError;
use pipeline_calendar::grid::{WeekStart, month_range};
use pipeline_calendar::ics::{ExportScope, export_scope};
use pipeline_calendar::locations::{config_path, log_dir, preferences_path, resolve_tracker_path};
use pipeline_calendar::logging::{default_log_level, init_logging};
use pipeline_calendar::prefs::{JsonFileStore, PreferenceStore};
use pipeline_calendar::storage::Tracker;
use pipeline_calendar::ui::run_dashboard;

#[derive(Debug, Parser)]
#[command(name = "pipeline-calendar", about = "Calendar and funnel analytics for a job search")]
struct Cli {
	#[arg(long, global = true)]
	tracker: Option<PathBuf>,
	/// sunday|monday (or 0|1)
	#[arg(long, global = true)]
	week_start: Option<String>,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	Init,
	Dashboard,
	Add {
		#[arg(long)]
		title: String,
		#[arg(long)]
		company: String,
		#[arg(long)]
		status: Option<String>,
		/// YYYY-MM-DD or RFC 3339; defaults to today
		#[arg(long)]
		date: Option<String>,
		#[arg(long)]
		interview: Option<String>,
		#[arg(long)]
		score: Option<f64>,
	},
	List {
		#[command(flatten)]
		window: Window,
	},
	Funnel {
		#[command(flatten)]
		window: Window,
	},
	ExportIcs {
		#[command(flatten)]
		window: Window,
		#[arg(long)]
		out: Option<PathBuf>,
	},
	ExportCsv {
		#[command(flatten)]
		window: Window,
		#[arg(long)]
		out: Option<PathBuf>,
	},
	Summary {
		#[command(flatten)]
		window: Window,
	},
}

/// Which days and statuses a command looks at.
#[derive(Debug, clap::Args)]
struct Window {
	#[arg(long)]
	day: Option<String>,
	#[arg(long)]
	from: Option<String>,
	#[arg(long)]
	to: Option<String>,
	/// Repeatable; no value means every status.
	#[arg(long = "status")]
	statuses: Vec<String>,
}

impl Window {
	fn range(&self) -> Result<Option<DateRange>, CalendarError> {
		match (&self.from, &self.to) {
			(Some(from), Some(to)) => Ok(Some(DateRange::new(parse_day(from)?, parse_day(to)?))),
			(Some(from), None) => Ok(Some(DateRange::new(parse_day(from)?, today()))),
			(None, Some(_)) => Err(CalendarError::Invalid("--to needs --from".to_string())),
			(None, None) => Ok(None),
		}
	}

	fn day(&self) -> Result<chrono::NaiveDate, CalendarError> {
		match &self.day {
			Some(day) => parse_day(day),
			None => Ok(today()),
		}
	}

	/// An explicit range, else the single `--day` (today by default).
	fn detail_scope(&self) -> Result<DetailScope, CalendarError> {
		Ok(match self.range()? {
			Some(range) => DetailScope::Range(range),
			None => DetailScope::Day(self.day()?),
		})
	}

	/// An explicit range, else the month containing `--day`.
	fn span(&self) -> Result<DateRange, CalendarError> {
		match self.range()? {
			Some(range) => Ok(range),
			None => Ok(month_range(self.day()?)),
		}
	}

	fn filter(&self) -> Result<StatusFilter, CalendarError> {
		let statuses = self
			.statuses
			.iter()
			.map(|value| value.parse::<ApplicationStatus>())
			.collect::<Result<Vec<_>, _>>()?;
		Ok(StatusFilter::only(statuses))
	}
}

fn main() {
	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();

	let mut config = CalendarConfig::load(&config_path())?;
	if let Some(raw) = &cli.week_start {
		config.week_start =
			WeekStart::parse(raw).ok_or_else(|| CalendarError::Invalid(format!("unknown week start: {raw}")))?;
	}

	let level = config.log_level.clone().unwrap_or_else(|| default_log_level().to_string());
	if let Err(err) = init_logging(&level, &log_dir()) {
		eprintln!("warning: logging disabled: {err}");
	}

	let tracker_path = resolve_tracker_path(cli.tracker);
	let mut tracker = Tracker::open(&tracker_path)?;

	match cli.command.unwrap_or(Command::Dashboard) {
		Command::Init => {
			tracker.save()?;
			let config_file = config_path();
			if !config_file.exists() {
				config.save_to(&config_file)?;
			}
			println!("initialized tracker at {}", tracker_path.display());
		}
		Command::Dashboard => {
			let prefs = PreferenceStore::new(JsonFileStore::open(preferences_path()));
			run_dashboard(&mut tracker, &config, prefs)?;
		}
		Command::Add {
			title,
			company,
			status,
			date,
			interview,
			score,
		} => {
			let status = match status {
				Some(raw) => raw.parse::<ApplicationStatus>()?,
				None => ApplicationStatus::Pending,
			};
			let applied_on = match date {
				Some(raw) => parse_timestamp(&raw)?.date_naive(),
				None => today(),
			};
			let record = tracker.create_application(NewApplication {
				job_title: title,
				company,
				status,
				applied_on,
			})?;

			let patch = ApplicationPatch {
				status: None,
				interview_date: interview.as_deref().map(parse_timestamp).transpose()?,
				match_score: score,
			};
			if patch.interview_date.is_some() || patch.match_score.is_some() {
				tracker.update_application(&record.id, &patch)?;
			}
			println!("created application {}", record.id);
		}
		Command::List { window } => {
			let range = window.span()?;
			let filter = window.filter()?;
			print_applications(&tracker, range, &filter);
		}
		Command::Funnel { window } => {
			let range = window.span()?;
			let analytics = aggregate(&tracker.applications, range, &window.filter()?);
			let funnel = analytics.funnel;
			println!("funnel {} to {}", range.start, range.end);
			println!("applied:   {}", funnel.applied);
			println!("interview: {}", funnel.interview);
			println!("offer:     {}", funnel.offer);
			println!("rejected:  {}", funnel.rejection);
			println!("applied -> interview: {:.1}%", funnel.applied_to_interview * 100.0);
			println!("interview -> offer:   {:.1}%", funnel.interview_to_offer * 100.0);
			println!("applied -> offer:     {:.1}%", funnel.applied_to_offer * 100.0);
		}
		Command::ExportIcs { window, out } => {
			let scope = ExportScope::pick(window.day()?, window.range()?);
			let (file_name, body) = export_scope(
				&tracker.events(),
				scope,
				&window.filter()?,
				&config.export_prefix,
				&config.ics_options(),
			);
			let path = output_path(out, file_name);
			fs::write(&path, body)?;
			println!("wrote {}", path.display());
		}
		Command::ExportCsv { window, out } => {
			let scope = window.detail_scope()?;
			let detail = DetailView::compute(scope, &tracker.applications, &window.filter()?);
			let body = export_csv(detail.applications.iter().copied())?;
			let path = output_path(out, scope.csv_file_name(&config.export_prefix));
			fs::write(&path, body)?;
			println!("wrote {}", path.display());
		}
		Command::Summary { window } => {
			let scope = window.detail_scope()?;
			let detail = DetailView::compute(scope, &tracker.applications, &window.filter()?);
			println!("{}", summary_text(&detail));
		}
	}

	Ok(())
}

/// `out` may name a file or an existing directory; defaults to the working directory.
fn output_path(out: Option<PathBuf>, file_name: String) -> PathBuf {
	match out {
		Some(path) if path.is_dir() => path.join(file_name),
		Some(path) => path,
		None => match env::current_dir() {
			Ok(dir) => dir.join(file_name),
			Err(err) => {
				warn!("event=cwd_unavailable error={}", err);
				PathBuf::from(file_name)
			}
		},
	}
}

fn print_applications(tracker: &Tracker, range: DateRange, filter: &StatusFilter) {
	let mut rows = tracker
		.applications
		.iter()
		.filter(|application| range.contains(application.applied_date.date_naive()))
		.filter(|application| filter.matches(Some(application.status.as_str())))
		.collect::<Vec<_>>();
	if rows.is_empty() {
		println!("no applications between {} and {}", range.start, range.end);
		return;
	}

	rows.sort_by(|left, right| left.applied_date.cmp(&right.applied_date));
	for application in rows {
		let interview = application
			.interview_date
			.map(|date| format!(" | interview {}", date.format("%Y-%m-%d %H:%M")))
			.unwrap_or_default();
		let score = application
			.match_score
			.map(|score| format!(" | match {score:.0}"))
			.unwrap_or_default();
		println!(
			"{} | {} | {:<9} | {} @ {}{}{}",
			application.id,
			application.applied_date.format("%Y-%m-%d"),
			application.status.as_str(),
			application.job_title,
			application.company,
			interview,
			score
		);
	}
}
