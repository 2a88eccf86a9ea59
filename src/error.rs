//! Error types shared by the analytics engine.

use chrono::NaiveDate;

/// Result type for analytics operations
pub type Result<T> = std::result::Result<T, AnalyticsError>;

/// Which kind of entity an id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Assignment,
    Student,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Assignment => write!(f, "assignment"),
            EntityKind::Student => write!(f, "student"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    /// Invalid construction parameters. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A lookup named an id that was never registered with the grid.
    #[error("Unknown {kind}: {id}")]
    UnknownEntity { kind: EntityKind, id: u64 },

    /// Persisting a rollup chunk failed. The next scheduled run resumes from here.
    #[error("Rollup chunk for {day} failed: {message}")]
    TransientIo { day: NaiveDate, message: String },

    /// Input data contradicts itself (e.g. a submission resolved for the wrong student).
    #[error("Data consistency violation: {0}")]
    DataConsistency(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AnalyticsError {
    pub fn unknown_assignment(id: u64) -> Self {
        AnalyticsError::UnknownEntity {
            kind: EntityKind::Assignment,
            id,
        }
    }

    pub fn unknown_student(id: u64) -> Self {
        AnalyticsError::UnknownEntity {
            kind: EntityKind::Student,
            id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_entity_message() {
        let err = AnalyticsError::unknown_student(42);
        assert_eq!(err.to_string(), "Unknown student: 42");
    }

    #[test]
    fn test_transient_io_names_day() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let err = AnalyticsError::TransientIo {
            day,
            message: "disk full".into(),
        };
        assert_eq!(err.to_string(), "Rollup chunk for 2024-03-01 failed: disk full");
    }
}
