use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TardyStatus {
    OnTime,
    Late,
    Missing,
    /// Not handed in and not yet past due.
    Floating,
}

/// Classification of one submission against its due date.
///
/// Inputs are fixed at construction; the status is derived on first access
/// and cached for the life of the value.
#[derive(Debug, Clone)]
pub struct Tardy {
    due_at: Option<DateTime<Utc>>,
    submitted_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    status: OnceCell<TardyStatus>,
}

impl Tardy {
    pub fn new(
        due_at: Option<DateTime<Utc>>,
        submitted_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            due_at,
            submitted_at,
            now,
            status: OnceCell::new(),
        }
    }

    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        self.due_at
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    pub fn status(&self) -> TardyStatus {
        *self.status.get_or_init(|| self.decide())
    }

    pub fn is_on_time(&self) -> bool {
        self.status() == TardyStatus::OnTime
    }

    pub fn is_late(&self) -> bool {
        self.status() == TardyStatus::Late
    }

    pub fn is_missing(&self) -> bool {
        self.status() == TardyStatus::Missing
    }

    pub fn is_floating(&self) -> bool {
        self.status() == TardyStatus::Floating
    }

    fn decide(&self) -> TardyStatus {
        match (self.due_at, self.submitted_at) {
            (Some(due_at), Some(submitted_at)) if submitted_at > due_at => TardyStatus::Late,
            (_, Some(_)) => TardyStatus::OnTime,
            (Some(due_at), None) if due_at < self.now => TardyStatus::Missing,
            (_, None) => TardyStatus::Floating,
        }
    }
}

impl PartialEq for Tardy {
    fn eq(&self, other: &Self) -> bool {
        self.due_at == other.due_at
            && self.submitted_at == other.submitted_at
            && self.now == other.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn days(n: i64) -> DateTime<Utc> {
        now() + Duration::days(n)
    }

    #[test]
    fn test_submitted_before_past_due_date_is_on_time() {
        let tardy = Tardy::new(Some(days(-2)), Some(days(-3)), now());
        assert_eq!(tardy.status(), TardyStatus::OnTime);
    }

    #[test]
    fn test_submitted_before_future_due_date_is_on_time() {
        let tardy = Tardy::new(Some(days(2)), Some(days(-1)), now());
        assert_eq!(tardy.status(), TardyStatus::OnTime);
    }

    #[test]
    fn test_submitted_after_past_due_date_is_late() {
        let tardy = Tardy::new(Some(days(-3)), Some(days(-1)), now());
        assert_eq!(tardy.status(), TardyStatus::Late);
        assert!(tardy.is_late());
    }

    #[test]
    fn test_unsubmitted_past_due_is_missing() {
        let tardy = Tardy::new(Some(days(-1)), None, now());
        assert_eq!(tardy.status(), TardyStatus::Missing);
    }

    #[test]
    fn test_unsubmitted_future_due_is_floating() {
        let tardy = Tardy::new(Some(days(1)), None, now());
        assert_eq!(tardy.status(), TardyStatus::Floating);
    }

    #[test]
    fn test_submitted_without_due_date_is_on_time() {
        let tardy = Tardy::new(None, Some(days(-1)), now());
        assert_eq!(tardy.status(), TardyStatus::OnTime);
    }

    #[test]
    fn test_nothing_known_is_floating() {
        let tardy = Tardy::new(None, None, now());
        assert_eq!(tardy.status(), TardyStatus::Floating);
        assert!(tardy.is_floating());
    }

    #[test]
    fn test_submitted_exactly_at_due_is_on_time() {
        let tardy = Tardy::new(Some(days(-1)), Some(days(-1)), now());
        assert!(tardy.is_on_time());
    }

    #[test]
    fn test_due_exactly_now_is_not_missing() {
        let tardy = Tardy::new(Some(now()), None, now());
        assert!(tardy.is_floating());
    }

    #[test]
    fn test_status_is_stable_across_calls() {
        let tardy = Tardy::new(Some(days(-1)), None, now());
        assert_eq!(tardy.status(), tardy.status());
        assert!(tardy.is_missing());
    }
}
