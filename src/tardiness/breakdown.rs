use serde::{Deserialize, Serialize};

use super::tardy::{Tardy, TardyStatus};

/// Counts of each tardiness status over some set of submissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TardinessBreakdown {
    pub missing: u64,
    pub late: u64,
    pub on_time: u64,
    #[serde(default)]
    pub floating: u64,
    pub total: u64,
}

/// A breakdown divided through by some denominator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScaledBreakdown {
    pub missing: f64,
    pub late: f64,
    pub on_time: f64,
    pub floating: f64,
}

impl TardinessBreakdown {
    pub fn new(missing: u64, late: u64, on_time: u64) -> Self {
        Self::with_floating(missing, late, on_time, 0)
    }

    pub fn with_floating(missing: u64, late: u64, on_time: u64, floating: u64) -> Self {
        Self {
            missing,
            late,
            on_time,
            floating,
            total: missing + late + on_time + floating,
        }
    }

    pub fn tally<'a>(tardies: impl IntoIterator<Item = &'a Tardy>) -> Self {
        let mut breakdown = Self::default();
        for tardy in tardies {
            breakdown.record(tardy.status());
        }
        breakdown
    }

    pub fn record(&mut self, status: TardyStatus) {
        match status {
            TardyStatus::Missing => self.missing += 1,
            TardyStatus::Late => self.late += 1,
            TardyStatus::OnTime => self.on_time += 1,
            TardyStatus::Floating => self.floating += 1,
        }
        self.total += 1;
    }

    /// Field-wise sum, used when combining sections.
    pub fn combine(&self, other: &Self) -> Self {
        Self::with_floating(
            self.missing + other.missing,
            self.late + other.late,
            self.on_time + other.on_time,
            self.floating + other.floating,
        )
    }

    /// Divides every count by `denominator`. A zero denominator yields all zeros.
    pub fn as_hash_scaled(&self, denominator: u64) -> ScaledBreakdown {
        if denominator == 0 {
            return ScaledBreakdown::default();
        }
        let d = denominator as f64;
        ScaledBreakdown {
            missing: self.missing as f64 / d,
            late: self.late as f64 / d,
            on_time: self.on_time as f64 / d,
            floating: self.floating as f64 / d,
        }
    }

    /// Fractions of this breakdown's own total.
    pub fn as_fractions(&self) -> ScaledBreakdown {
        self.as_hash_scaled(self.total)
    }
}
