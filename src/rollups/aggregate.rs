use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::rollups::types::AssignmentRollup;
use crate::scores::{ScoreBuckets, ScoreSummary};
use crate::tardiness::{ScaledBreakdown, TardinessBreakdown};
use crate::types::AssignmentId;

/// One assignment's statistics combined across the sections a viewer can see.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentRollupAggregate {
    pub assignment_id: AssignmentId,
    pub title: String,
    pub due_at: Option<DateTime<Utc>>,
    pub muted: bool,
    pub points_possible: Option<f64>,
    pub non_digital_submission: bool,
    #[serde(flatten)]
    pub score: ScoreSummary,
    pub score_buckets: Vec<u64>,
    pub total_submissions: u64,
    pub tardiness_breakdown: ScaledBreakdown,
}

/// Combines section rollups of the same assignment.
///
/// Extremes are exact. Quartiles come from the element-wise sum of the
/// sections' histograms, so they are approximate to one bucket width.
/// Tardiness counts are summed before scaling. Returns `None` for no input.
pub fn aggregate_rollups(rollups: &[AssignmentRollup]) -> Result<Option<AssignmentRollupAggregate>> {
    let Some(first) = rollups.first() else {
        return Ok(None);
    };

    let (score, score_buckets) = match first.points_possible {
        Some(points_possible) => {
            let merged = ScoreBuckets::merge(
                Some(points_possible),
                rollups.iter().map(|r| r.score_buckets.as_slice()),
            )?;
            let mut score = merged.summary();
            // Sections with no scores report zeroed extremes; leave them out.
            let scored: Vec<_> = rollups
                .iter()
                .filter(|r| r.score_buckets.iter().any(|&n| n > 0))
                .collect();
            if !scored.is_empty() {
                score.max_score = scored
                    .iter()
                    .map(|r| r.max_score)
                    .fold(f64::NEG_INFINITY, f64::max);
                score.min_score = scored
                    .iter()
                    .map(|r| r.min_score)
                    .fold(f64::INFINITY, f64::min);
            }
            (score, merged.buckets().to_vec())
        }
        None => (ScoreSummary::default(), Vec::new()),
    };

    let tardiness = rollups
        .iter()
        .fold(TardinessBreakdown::default(), |sum, r| sum.combine(&r.tardiness()));
    let total_submissions: u64 = rollups.iter().map(|r| r.total_submissions).sum();

    debug!(
        assignment_id = first.assignment_id,
        sections = rollups.len(),
        total_submissions,
        "Aggregated section rollups"
    );

    Ok(Some(AssignmentRollupAggregate {
        assignment_id: first.assignment_id,
        title: first.title.clone(),
        due_at: first.due_at,
        muted: first.muted,
        points_possible: first.points_possible,
        non_digital_submission: first.non_digital_submission,
        score,
        score_buckets,
        total_submissions,
        tardiness_breakdown: tardiness.as_hash_scaled(total_submissions),
    }))
}
