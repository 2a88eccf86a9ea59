//! Trait for persisting rollup bins.

use anyhow::Result;
use chrono::NaiveDate;

use crate::rollups::types::{BinKey, RollupBin};

/// Durable storage for rollup bins.
#[async_trait::async_trait]
pub trait BinStore: Send + Sync {
    /// The stored bin for `key`, or a fresh unsaved one with `new_record` set.
    async fn find_or_init(&self, key: &BinKey) -> Result<RollupBin>;

    /// [`Self::find_or_init`] for several keys, in the same order.
    ///
    /// Stores that read a whole backing file should load it once here.
    async fn find_or_init_all(&self, keys: &[BinKey]) -> Result<Vec<RollupBin>> {
        let mut bins = Vec::with_capacity(keys.len());
        for key in keys {
            bins.push(self.find_or_init(key).await?);
        }
        Ok(bins)
    }

    /// Earliest date that has any bin on or after `date`.
    async fn earliest_date_on_or_after(&self, date: NaiveDate) -> Result<Option<NaiveDate>>;

    /// Saves `bins` atomically: either all are written or none are.
    ///
    /// A `new_record` bin whose key has meanwhile been created elsewhere is
    /// left alone; bins loaded from the store are saved with their current
    /// counts. Returns how many bins were written.
    async fn commit(&self, bins: &[RollupBin]) -> Result<usize>;

    /// Every bin for one scope, oldest first.
    async fn bins_for_scope(&self, scope_id: u64) -> Result<Vec<RollupBin>>;
}
