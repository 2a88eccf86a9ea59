//! Output formatting and persistence for computed statistics.
//!
//! Supports pretty-printing, JSON serialization, and CSV append.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::stats::AssignmentStats;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// One [`AssignmentStats`] flattened into a CSV row.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentStatsRow {
    pub computed_at: DateTime<Utc>,
    pub course_id: u64,
    pub assignment_id: u64,
    pub title: String,
    pub due_at: Option<DateTime<Utc>>,
    pub points_possible: Option<f64>,
    pub muted: bool,
    pub max_score: f64,
    pub min_score: f64,
    pub first_quartile: f64,
    pub median: f64,
    pub third_quartile: f64,
    /// Bucket counts joined with `;`.
    pub score_buckets: String,
    pub missing: u64,
    pub late: u64,
    pub on_time: u64,
    pub floating: u64,
    pub total: u64,
    pub missing_pct: f64,
    pub late_pct: f64,
    pub on_time_pct: f64,
}

impl AssignmentStatsRow {
    pub fn new(course_id: u64, stats: &AssignmentStats, computed_at: DateTime<Utc>) -> Self {
        let t = &stats.tardiness;
        let scaled = &stats.tardiness_breakdown;
        Self {
            computed_at,
            course_id,
            assignment_id: stats.assignment_id,
            title: stats.title.clone(),
            due_at: stats.due_at,
            points_possible: stats.points_possible,
            muted: stats.muted,
            max_score: stats.score.max_score,
            min_score: stats.score.min_score,
            first_quartile: stats.score.first_quartile,
            median: stats.score.median,
            third_quartile: stats.score.third_quartile,
            score_buckets: stats
                .score_buckets
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(";"),
            missing: t.missing,
            late: t.late,
            on_time: t.on_time,
            floating: t.floating,
            total: t.total,
            missing_pct: pct(scaled.missing),
            late_pct: pct(scaled.late),
            on_time_pct: pct(scaled.on_time),
        }
    }
}

/// Fraction as a percentage rounded to two decimals.
fn pct(fraction: f64) -> f64 {
    (fraction * 10_000.0).round() / 100.0
}

/// Logs any value using Rust's debug pretty-print format.
pub fn print_pretty<T: std::fmt::Debug>(value: &T) {
    debug!("{:#?}", value);
}

/// Logs any value as pretty-printed JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Appends a record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record<T: Serialize>(path: &str, record: &T) -> Result<()> {
    append_records(path, std::slice::from_ref(record))
}

/// Appends several records, writing headers only when the file is new.
pub fn append_records<T: Serialize>(path: &str, records: &[T]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = records.len(), "Appending CSV records");

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scores::ScoreSummary;
    use crate::tardiness::TardinessBreakdown;
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use std::fs;

    fn stats() -> AssignmentStats {
        let tardiness = TardinessBreakdown::new(1, 1, 1);
        AssignmentStats {
            assignment_id: 5,
            title: "Quiz, part 1".into(),
            due_at: None,
            points_possible: Some(3.0),
            muted: false,
            non_digital_submission: false,
            score: ScoreSummary {
                max_score: 3.0,
                min_score: 1.0,
                first_quartile: 1.0,
                median: 2.0,
                third_quartile: 3.0,
            },
            score_buckets: vec![0, 1, 1, 1],
            tardiness,
            tardiness_breakdown: tardiness.as_fractions(),
            extra: BTreeMap::new(),
        }
    }

    fn row() -> AssignmentStatsRow {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        AssignmentStatsRow::new(2, &stats(), at)
    }

    #[test]
    fn test_row_flattens_stats() {
        let row = row();
        assert_eq!(row.score_buckets, "0;1;1;1");
        assert_eq!(row.late_pct, 33.33);
        assert_eq!(row.total, 3);
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        print_pretty(&stats());
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&stats()).unwrap();
        print_json(&[row()]).unwrap();
    }

    #[test]
    fn test_append_record_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.csv");
        let path = path.to_str().unwrap();

        append_record(path, &row()).unwrap();

        assert!(Path::new(path).exists());
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("\"Quiz, part 1\""));
    }

    #[test]
    fn test_append_record_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.csv");
        let path = path.to_str().unwrap();

        append_record(path, &row()).unwrap();
        append_record(path, &row()).unwrap();

        let content = fs::read_to_string(path).unwrap();
        // Header line should appear exactly once
        let header_count = content.lines().filter(|l| l.contains("computed_at")).count();
        assert_eq!(header_count, 1);
    }

    #[test]
    fn test_append_records_two_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/stats.csv");
        let path = path.to_str().unwrap();

        append_records(path, &[row(), row()]).unwrap();

        let content = fs::read_to_string(path).unwrap();
        // 1 header + 2 data rows
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
    }
}
