use anyhow::Result;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use crate::rollups::types::{BinKey, RollupBin};
use crate::services::BinStore;

/// Keeps bins in process memory. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryBinStore {
    bins: Mutex<BTreeMap<BinKey, RollupBin>>,
}

impl MemoryBinStore {
    pub async fn len(&self) -> usize {
        self.bins.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.bins.lock().await.is_empty()
    }
}

/// Applies `bins` to `stored` with create-once semantics. Returns how many were written.
pub(crate) fn apply(stored: &mut BTreeMap<BinKey, RollupBin>, bins: &[RollupBin]) -> usize {
    let mut written = 0;
    for bin in bins {
        match stored.get_mut(&bin.key) {
            Some(_) if bin.new_record => continue,
            Some(existing) => {
                existing.views = bin.views;
                existing.participations = bin.participations;
            }
            None => {
                let mut saved = bin.clone();
                saved.new_record = false;
                stored.insert(saved.key.clone(), saved);
            }
        }
        written += 1;
    }
    written
}

#[async_trait::async_trait]
impl BinStore for MemoryBinStore {
    async fn find_or_init(&self, key: &BinKey) -> Result<RollupBin> {
        let bins = self.bins.lock().await;
        Ok(bins
            .get(key)
            .cloned()
            .unwrap_or_else(|| RollupBin::initialize(key.clone())))
    }

    async fn earliest_date_on_or_after(&self, date: NaiveDate) -> Result<Option<NaiveDate>> {
        let bins = self.bins.lock().await;
        Ok(bins.keys().map(|k| k.date).filter(|d| *d >= date).min())
    }

    async fn commit(&self, bins: &[RollupBin]) -> Result<usize> {
        let mut stored = self.bins.lock().await;
        Ok(apply(&mut stored, bins))
    }

    async fn bins_for_scope(&self, scope_id: u64) -> Result<Vec<RollupBin>> {
        let bins = self.bins.lock().await;
        let mut found: Vec<_> = bins
            .values()
            .filter(|b| b.key.scope_id == scope_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.key.date.cmp(&b.key.date).then(a.key.category.cmp(&b.key.category)));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    fn new_bin(scope: u64, d: u32, views: u64) -> RollupBin {
        let mut bin = RollupBin::initialize(BinKey::new(scope, day(d), "files"));
        bin.augment(views, 0);
        bin
    }

    #[tokio::test]
    async fn test_new_bins_are_created_once() {
        let store = MemoryBinStore::default();
        assert_eq!(store.commit(&[new_bin(1, 3, 5)]).await.unwrap(), 1);
        assert_eq!(store.commit(&[new_bin(1, 3, 9)]).await.unwrap(), 0);

        let bin = store.find_or_init(&BinKey::new(1, day(3), "files")).await.unwrap();
        assert_eq!(bin.views, 5);
        assert!(!bin.new_record);
    }

    #[tokio::test]
    async fn test_existing_bins_are_saved_after_augment() {
        let store = MemoryBinStore::default();
        store.commit(&[new_bin(1, 3, 5)]).await.unwrap();

        let mut bin = store.find_or_init(&BinKey::new(1, day(3), "files")).await.unwrap();
        bin.augment(2, 1);
        store.commit(&[bin]).await.unwrap();

        let bin = store.find_or_init(&BinKey::new(1, day(3), "files")).await.unwrap();
        assert_eq!((bin.views, bin.participations), (7, 1));
    }

    #[tokio::test]
    async fn test_earliest_date_and_listing() {
        let store = MemoryBinStore::default();
        store
            .commit(&[new_bin(1, 9, 1), new_bin(1, 4, 1), new_bin(2, 6, 1)])
            .await
            .unwrap();

        assert_eq!(store.earliest_date_on_or_after(day(5)).await.unwrap(), Some(day(6)));
        assert_eq!(store.earliest_date_on_or_after(day(10)).await.unwrap(), None);

        let dates: Vec<_> = store
            .bins_for_scope(1)
            .await
            .unwrap()
            .iter()
            .map(|b| b.key.date)
            .collect();
        assert_eq!(dates, vec![day(4), day(9)]);
        assert_eq!(store.len().await, 3);
    }
}
