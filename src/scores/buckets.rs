use tracing::debug;

use super::counter::{ScoreCounter, ScoreSummary};
use crate::error::{AnalyticsError, Result};

/// Upper bound on histogram resolution.
pub const MAX_BUCKETS: usize = 26;

/// Fixed-size histogram over `[0, points_possible]`.
///
/// Scales up to 25 points get one bucket per integer score; larger scales
/// fall back to 26 evenly spaced buckets. Buckets are centred on multiples of
/// `bucket_size`.
#[derive(Debug, Clone)]
pub struct ScoreBuckets {
    points_possible: f64,
    bucket_size: f64,
    buckets: Vec<u64>,
    counter: ScoreCounter,
}

impl ScoreBuckets {
    pub fn new(points_possible: Option<f64>) -> Result<Self> {
        let points_possible = points_possible.ok_or_else(|| {
            AnalyticsError::Configuration("score buckets need points_possible".into())
        })?;
        if !points_possible.is_finite() || points_possible < 0.0 {
            return Err(AnalyticsError::Configuration(format!(
                "points_possible must be a non-negative number, got {points_possible}"
            )));
        }

        let bucket_count = points_possible.floor().min((MAX_BUCKETS - 1) as f64) as usize + 1;
        let bucket_size = if bucket_count > 1 {
            points_possible / (bucket_count - 1) as f64
        } else {
            0.0
        };

        Ok(Self {
            points_possible,
            bucket_size,
            buckets: vec![0; bucket_count],
            counter: ScoreCounter::new(),
        })
    }

    /// Rebuilds a histogram from stored bucket counts by replaying each
    /// bucket's centre value once per recorded occurrence.
    pub fn parse(points_possible: Option<f64>, bucket_list: &[u64]) -> Result<Self> {
        let mut buckets = Self::new(points_possible)?;
        if bucket_list.len() > buckets.bucket_count() {
            return Err(AnalyticsError::Configuration(format!(
                "{} stored buckets exceed the {} buckets for {} points",
                bucket_list.len(),
                buckets.bucket_count(),
                buckets.points_possible
            )));
        }

        for (i, &occurrences) in bucket_list.iter().enumerate() {
            buckets.push_n(i as f64 * buckets.bucket_size, occurrences);
        }
        Ok(buckets)
    }

    /// Merges several stored histograms for the same scale.
    ///
    /// Only bucket membership survives, so quartiles of the result are
    /// accurate to within one bucket width.
    pub fn merge<'a>(
        points_possible: Option<f64>,
        bucket_lists: impl IntoIterator<Item = &'a [u64]>,
    ) -> Result<Self> {
        let mut composite: Vec<u64> = Vec::new();
        let mut sections = 0;
        for list in bucket_lists {
            if composite.len() < list.len() {
                composite.resize(list.len(), 0);
            }
            for (total, &count) in composite.iter_mut().zip(list) {
                *total += count;
            }
            sections += 1;
        }
        debug!(sections, buckets = composite.len(), "Merging score histograms");
        Self::parse(points_possible, &composite)
    }

    pub fn push(&mut self, value: f64) {
        self.push_n(value, 1);
    }

    fn push_n(&mut self, value: f64, occurrences: u64) {
        if occurrences == 0 {
            return;
        }
        let index = self.index_for(value);
        self.buckets[index] += occurrences;
        self.counter.push_n(value, occurrences);
    }

    /// Bucket for `value`, rounding to the nearest bucket centre. Always a
    /// valid index.
    pub fn index_for(&self, value: f64) -> usize {
        let last = self.buckets.len() - 1;
        if value <= 0.0 || self.bucket_size == 0.0 {
            0
        } else if value >= self.points_possible {
            last
        } else {
            ((value / self.bucket_size + 0.5).floor() as usize).min(last)
        }
    }

    pub fn points_possible(&self) -> f64 {
        self.points_possible
    }

    pub fn bucket_size(&self) -> f64 {
        self.bucket_size
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    pub fn count(&self) -> u64 {
        self.counter.count()
    }

    pub fn counter(&self) -> &ScoreCounter {
        &self.counter
    }

    pub fn summary(&self) -> ScoreSummary {
        self.counter.summary()
    }
}

impl Extend<f64> for ScoreBuckets {
    fn extend<T: IntoIterator<Item = f64>>(&mut self, values: T) {
        for value in values {
            self.push(value);
        }
    }
}
