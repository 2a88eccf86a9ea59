//! CLI entry point for the course analytics tool.
//!
//! Provides subcommands for tardiness tallies and assignment statistics over a
//! course snapshot, aggregating stored section rollups, and rolling page views
//! up into daily bins.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use course_analytics::{
    config::RollupConfig,
    infra::{events::CsvEventSource, store::CsvBinStore},
    output::{AssignmentStatsRow, append_records, print_json},
    parser::{load_rollups, load_snapshot},
    rollups::{RollupDriver, aggregate_rollups},
    services::BinStore,
    stats::{StatsCalculator, StudentInCourseScope},
    tardiness::{Dimension, TardinessGrid},
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "course_analytics")]
#[command(about = "Tardiness, grade distribution and page view rollups for courses", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum TallyBy {
    Assignment,
    Student,
}

#[derive(Subcommand)]
enum Commands {
    /// Tally missing / late / on-time work in a course snapshot
    Tardiness {
        /// Course snapshot JSON file
        #[arg(value_name = "SNAPSHOT")]
        snapshot: String,

        /// Tally per assignment or per student
        #[arg(short, long, value_enum, default_value_t = TallyBy::Assignment)]
        by: TallyBy,

        /// Evaluate as of this instant (RFC 3339) instead of now
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
    /// Compute per-assignment score and tardiness statistics
    Summarize {
        /// Course snapshot JSON file
        #[arg(value_name = "SNAPSHOT")]
        snapshot: String,

        /// Restrict to one student's view of the course
        #[arg(short, long)]
        student: Option<u64>,

        /// CSV file to append results to; prints JSON when absent
        #[arg(short, long)]
        output: Option<String>,

        /// Evaluate as of this instant (RFC 3339) instead of now
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
    /// Build the per-section rollup rows for a course snapshot
    SectionRollups {
        /// Course snapshot JSON file
        #[arg(value_name = "SNAPSHOT")]
        snapshot: String,

        /// Evaluate as of this instant (RFC 3339) instead of now
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
    /// Combine stored section rollups into course-level rows
    Aggregate {
        /// JSON file holding an array of section rollups
        #[arg(value_name = "ROLLUPS")]
        rollups: String,
    },
    /// Roll raw page views up into daily per-category bins
    Rollup {
        /// Directory of date=YYYY-MM-DD.csv[.gz] page view files
        #[arg(short, long, default_value = "page_views")]
        events_dir: String,

        /// CSV file holding the bins
        #[arg(short, long, default_value = "bins.csv")]
        bins: String,

        /// Rollup config JSON file
        #[arg(short, long)]
        config: Option<String>,

        /// Compute and log without saving anything
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Override whether source records are flagged once rolled up
        #[arg(long)]
        mark_summarized: Option<bool>,

        /// Treat this date as today
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Show the stored bins for one course
    Bins {
        /// CSV file holding the bins
        #[arg(short, long, default_value = "bins.csv")]
        bins: String,

        /// Course to show
        #[arg(value_name = "SCOPE_ID")]
        scope_id: u64,
    },
}

#[derive(Serialize)]
struct TallyRow {
    id: u64,
    #[serde(flatten)]
    breakdown: course_analytics::tardiness::TardinessBreakdown,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/course_analytics.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("course_analytics.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Tardiness { snapshot, by, now } => {
            tardiness(&snapshot, by, now.unwrap_or_else(Utc::now))?;
        }
        Commands::Summarize {
            snapshot,
            student,
            output,
            now,
        } => {
            summarize(&snapshot, student, output.as_deref(), now.unwrap_or_else(Utc::now))?;
        }
        Commands::SectionRollups { snapshot, now } => {
            let course = load_snapshot(&snapshot)?;
            let rollups =
                StatsCalculator::new(&course, now.unwrap_or_else(Utc::now)).section_rollups()?;
            info!(rows = rollups.len(), "Section rollups built");
            print_json(&rollups)?;
        }
        Commands::Aggregate { rollups } => {
            aggregate(&rollups)?;
        }
        Commands::Rollup {
            events_dir,
            bins,
            config,
            dry_run,
            mark_summarized,
            today,
        } => {
            let mut config = match config {
                Some(path) => RollupConfig::load(&path)?,
                None => RollupConfig::default(),
            }
            .with_dry_run(dry_run);
            if let Some(mark) = mark_summarized {
                config.mark_summarized = mark;
            }

            let driver = RollupDriver::new(
                CsvEventSource::new(&events_dir),
                CsvBinStore::new(&bins),
                config,
            );
            let report = driver
                .run(today.unwrap_or_else(|| Utc::now().date_naive()))
                .await
                .context("rollup run failed")?;
            print_json(&report)?;
        }
        Commands::Bins { bins, scope_id } => {
            let store = CsvBinStore::new(&bins);
            let found = store.bins_for_scope(scope_id).await?;
            if found.is_empty() {
                warn!(scope_id, path = %bins, "No bins stored for scope");
            }
            print_json(&found)?;
        }
    }

    Ok(())
}

/// Tallies every assignment or every student in a snapshot.
#[tracing::instrument(skip(by))]
fn tardiness(snapshot: &str, by: TallyBy, now: DateTime<Utc>) -> Result<()> {
    let course = load_snapshot(snapshot)?;
    let mut grid = TardinessGrid::new(
        course.assignments,
        course.students,
        course.submissions,
        now,
    );
    grid.prebuild()?;

    let (dimension, ids): (Dimension, Vec<u64>) = match by {
        TallyBy::Assignment => (
            Dimension::Assignment,
            grid.assignments().iter().map(|a| a.id).collect(),
        ),
        TallyBy::Student => (
            Dimension::Student,
            grid.students().iter().map(|s| s.id).collect(),
        ),
    };

    let mut rows = Vec::with_capacity(ids.len());
    for id in ids {
        rows.push(TallyRow {
            id,
            breakdown: grid.tally(dimension, id)?,
        });
    }
    print_json(&rows)
}

/// Computes assignment statistics for a course, or one student in it.
#[tracing::instrument]
fn summarize(
    snapshot: &str,
    student: Option<u64>,
    output: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    let course = load_snapshot(snapshot)?;
    let stats = match student {
        Some(student_id) => {
            let scope = StudentInCourseScope::new(&course, student_id)?;
            StatsCalculator::new(&scope, now).assignment_stats()?
        }
        None => StatsCalculator::new(&course, now).assignment_stats()?,
    };
    info!(assignments = stats.len(), "Assignment stats computed");

    match output {
        Some(path) => {
            let rows: Vec<_> = stats
                .iter()
                .map(|s| AssignmentStatsRow::new(course.course_id, s, now))
                .collect();
            append_records(path, &rows)?;
            info!(path, rows = rows.len(), "Stats appended");
            Ok(())
        }
        None => print_json(&stats),
    }
}

/// Groups section rollups by assignment and combines each group.
#[tracing::instrument]
fn aggregate(path: &str) -> Result<()> {
    let rollups = load_rollups(path)?;
    let mut by_assignment: BTreeMap<u64, Vec<_>> = BTreeMap::new();
    for rollup in rollups {
        by_assignment
            .entry(rollup.assignment_id)
            .or_default()
            .push(rollup);
    }

    let mut aggregates = Vec::with_capacity(by_assignment.len());
    for (assignment_id, sections) in &by_assignment {
        match aggregate_rollups(sections)? {
            Some(aggregate) => aggregates.push(aggregate),
            None => warn!(assignment_id, "No sections to aggregate"),
        }
    }
    info!(assignments = aggregates.len(), "Rollups aggregated");
    print_json(&aggregates)
}
