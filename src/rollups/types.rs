//! Data types used by the rollup pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::scores::ScoreSummary;
use crate::tardiness::TardinessBreakdown;
use crate::types::{AssignmentId, SectionId};

/// Persisted per-section rollup of one assignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRollup {
    pub assignment_id: AssignmentId,
    pub course_section_id: SectionId,
    pub title: String,
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub muted: bool,
    pub points_possible: Option<f64>,
    #[serde(default)]
    pub non_digital_submission: bool,

    pub max_score: f64,
    pub min_score: f64,
    pub first_quartile: f64,
    pub median: f64,
    pub third_quartile: f64,
    #[serde(default)]
    pub score_buckets: Vec<u64>,

    pub total_submissions: u64,
    pub missing_submissions: u64,
    pub late_submissions: u64,
    pub on_time_submissions: u64,
}

impl AssignmentRollup {
    pub fn score_summary(&self) -> ScoreSummary {
        ScoreSummary {
            max_score: self.max_score,
            min_score: self.min_score,
            first_quartile: self.first_quartile,
            median: self.median,
            third_quartile: self.third_quartile,
        }
    }

    pub fn set_score_summary(&mut self, summary: ScoreSummary) {
        self.max_score = summary.max_score;
        self.min_score = summary.min_score;
        self.first_quartile = summary.first_quartile;
        self.median = summary.median;
        self.third_quartile = summary.third_quartile;
    }

    /// Raw tardiness counts. Anything not missing, late or on time is floating.
    pub fn tardiness(&self) -> TardinessBreakdown {
        let counted = self.missing_submissions + self.late_submissions + self.on_time_submissions;
        TardinessBreakdown::with_floating(
            self.missing_submissions,
            self.late_submissions,
            self.on_time_submissions,
            self.total_submissions.saturating_sub(counted),
        )
    }
}

/// One raw page view as recorded by the request log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageView {
    pub request_id: String,
    /// Course the request was made in.
    pub context_id: u64,
    pub user_id: u64,
    pub created_at: DateTime<Utc>,
    pub controller: String,
    #[serde(default)]
    pub participated: bool,
    #[serde(default)]
    pub summarized: bool,
}

/// Identity of a rollup bin.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BinKey {
    pub scope_id: u64,
    pub date: NaiveDate,
    pub category: String,
}

impl BinKey {
    pub fn new(scope_id: u64, date: NaiveDate, category: impl Into<String>) -> Self {
        Self {
            scope_id,
            date,
            category: category.into(),
        }
    }
}

/// A persisted page-view counter. Created once, only ever added to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupBin {
    #[serde(flatten)]
    pub key: BinKey,
    pub views: u64,
    pub participations: u64,
    /// True until the bin has been committed to its store.
    #[serde(skip)]
    pub new_record: bool,
}

impl RollupBin {
    pub fn initialize(key: BinKey) -> Self {
        Self {
            key,
            views: 0,
            participations: 0,
            new_record: true,
        }
    }

    pub fn augment(&mut self, views: u64, participations: u64) {
        self.views += views;
        self.participations += participations;
    }
}

/// Outcome of one rollup run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub days_processed: usize,
    pub records_seen: usize,
    pub bins_created: usize,
    pub bins_skipped: usize,
    pub dry_run: bool,
    /// Another run on the same driver was already in progress.
    pub overlapping: bool,
}

/// Outcome of one day-sized chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkReport {
    pub records: usize,
    pub created: usize,
    pub skipped: usize,
}

impl RunReport {
    pub(crate) fn absorb(&mut self, chunk: ChunkReport) {
        self.days_processed += 1;
        self.records_seen += chunk.records;
        self.bins_created += chunk.created;
        self.bins_skipped += chunk.skipped;
    }
}
