//! Trait for reading the raw page-view log.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};

use crate::rollups::types::PageView;

/// Append-only source of page views awaiting rollup.
///
/// "Unprocessed" means not yet flagged as summarized.
#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    /// Timestamp of the earliest unprocessed record dated in `[from, until)`.
    async fn earliest_unprocessed(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Timestamp of the newest record of any kind.
    async fn latest_record_at(&self) -> Result<Option<DateTime<Utc>>>;

    /// All unprocessed records created on `day`.
    async fn unprocessed_on(&self, day: NaiveDate) -> Result<Vec<PageView>>;

    /// Flags the given records from `day` as summarized.
    async fn mark_summarized(&self, day: NaiveDate, request_ids: &[String]) -> Result<()>;
}
