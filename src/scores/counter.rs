use serde::{Deserialize, Serialize};

/// Order statistics reported for a score distribution. Zero when undefined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub max_score: f64,
    pub min_score: f64,
    pub first_quartile: f64,
    pub median: f64,
    pub third_quartile: f64,
}

/// Running exact statistics over a stream of scores.
///
/// Values are kept as weighted runs so that replaying a histogram costs one
/// entry per bucket rather than one per occurrence.
#[derive(Debug, Clone, Default)]
pub struct ScoreCounter {
    runs: Vec<(f64, u64)>,
    count: u64,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl ScoreCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        self.push_n(value, 1);
    }

    /// Records `weight` occurrences of `value`.
    pub fn push_n(&mut self, value: f64, weight: u64) {
        if weight == 0 {
            return;
        }
        match self.runs.last_mut() {
            Some((last, w)) if *last == value => *w += weight,
            _ => self.runs.push((value, weight)),
        }
        self.count += weight;
        self.sum += value * weight as f64;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    /// Arithmetic mean. Returns 0.0 for an empty counter.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }

    /// First quartile, median and third quartile.
    ///
    /// Quantile q sits at 0-based rank `(n + 1) * q - 1`, clamped to the data
    /// and interpolated linearly between neighbouring values.
    pub fn quartiles(&self) -> Option<[f64; 3]> {
        if self.count == 0 {
            return None;
        }
        let mut sorted = self.runs.clone();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        Some([0.25, 0.5, 0.75].map(|q| quantile(&sorted, self.count, q)))
    }

    pub fn summary(&self) -> ScoreSummary {
        match self.quartiles() {
            Some([q1, q2, q3]) => ScoreSummary {
                max_score: self.max.unwrap_or(0.0),
                min_score: self.min.unwrap_or(0.0),
                first_quartile: q1,
                median: q2,
                third_quartile: q3,
            },
            None => ScoreSummary::default(),
        }
    }
}

fn quantile(sorted: &[(f64, u64)], count: u64, q: f64) -> f64 {
    let last = (count - 1) as f64;
    let rank = ((count + 1) as f64 * q - 1.0).clamp(0.0, last);
    let lower = rank.floor();
    let frac = rank - lower;
    let low = nth(sorted, lower as u64);
    if frac == 0.0 {
        return low;
    }
    let high = nth(sorted, (lower as u64 + 1).min(count - 1));
    low * (1.0 - frac) + high * frac
}

fn nth(sorted: &[(f64, u64)], rank: u64) -> f64 {
    let mut seen = 0;
    for &(value, weight) in sorted {
        seen += weight;
        if rank < seen {
            return value;
        }
    }
    sorted.last().map_or(0.0, |&(value, _)| value)
}
