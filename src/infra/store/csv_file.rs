use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use super::memory::apply;
use crate::rollups::types::{BinKey, RollupBin};
use crate::services::BinStore;

/// One bin as a CSV row.
#[derive(Debug, Serialize, Deserialize)]
struct BinRow {
    scope_id: u64,
    date: NaiveDate,
    category: String,
    views: u64,
    participations: u64,
}

impl From<&RollupBin> for BinRow {
    fn from(bin: &RollupBin) -> Self {
        BinRow {
            scope_id: bin.key.scope_id,
            date: bin.key.date,
            category: bin.key.category.clone(),
            views: bin.views,
            participations: bin.participations,
        }
    }
}

impl From<BinRow> for RollupBin {
    fn from(row: BinRow) -> Self {
        RollupBin {
            key: BinKey::new(row.scope_id, row.date, row.category),
            views: row.views,
            participations: row.participations,
            new_record: false,
        }
    }
}

/// Stores all bins in a single CSV file.
///
/// Each commit rewrites the file through a temporary sibling and a rename, so
/// a failed commit leaves the previous contents in place.
pub struct CsvBinStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvBinStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<BinKey, RollupBin>> {
        let mut bins = BTreeMap::new();
        if !self.path.exists() {
            return Ok(bins);
        }

        let file = File::open(&self.path)
            .with_context(|| format!("opening bin file {}", self.path.display()))?;
        let mut rdr = csv::Reader::from_reader(file);
        for result in rdr.deserialize() {
            let row: BinRow = result?;
            let bin = RollupBin::from(row);
            bins.insert(bin.key.clone(), bin);
        }
        Ok(bins)
    }

    fn save(&self, bins: &BTreeMap<BinKey, RollupBin>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("csv.tmp");

        let mut writer = csv::Writer::from_path(&tmp)?;
        for bin in bins.values() {
            writer.serialize(BinRow::from(bin))?;
        }
        writer.flush()?;
        drop(writer);

        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing bin file {}", self.path.display()))?;
        debug!(path = %self.path.display(), bins = bins.len(), "Bin file written");
        Ok(())
    }
}

#[async_trait::async_trait]
impl BinStore for CsvBinStore {
    async fn find_or_init(&self, key: &BinKey) -> Result<RollupBin> {
        let _guard = self.lock.lock().await;
        let mut bins = self.load()?;
        Ok(bins
            .remove(key)
            .unwrap_or_else(|| RollupBin::initialize(key.clone())))
    }

    async fn find_or_init_all(&self, keys: &[BinKey]) -> Result<Vec<RollupBin>> {
        let _guard = self.lock.lock().await;
        let bins = self.load()?;
        Ok(keys
            .iter()
            .map(|key| {
                bins.get(key)
                    .cloned()
                    .unwrap_or_else(|| RollupBin::initialize(key.clone()))
            })
            .collect())
    }

    async fn earliest_date_on_or_after(&self, date: NaiveDate) -> Result<Option<NaiveDate>> {
        let _guard = self.lock.lock().await;
        Ok(self.load()?.keys().map(|k| k.date).filter(|d| *d >= date).min())
    }

    async fn commit(&self, bins: &[RollupBin]) -> Result<usize> {
        if bins.is_empty() {
            return Ok(0);
        }
        let _guard = self.lock.lock().await;
        let mut stored = self.load()?;
        let written = apply(&mut stored, bins);
        if written > 0 {
            self.save(&stored)?;
        }
        Ok(written)
    }

    async fn bins_for_scope(&self, scope_id: u64) -> Result<Vec<RollupBin>> {
        let _guard = self.lock.lock().await;
        let mut found: Vec<_> = self
            .load()?
            .into_values()
            .filter(|b| b.key.scope_id == scope_id)
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

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvBinStore::new(dir.path().join("bins.csv"));

        let bin = store.find_or_init(&BinKey::new(1, day(1), "files")).await.unwrap();
        assert!(bin.new_record);
        assert_eq!(store.earliest_date_on_or_after(day(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_commit_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollups").join("bins.csv");

        let mut bin = RollupBin::initialize(BinKey::new(4, day(2), "pages"));
        bin.augment(10, 4);
        CsvBinStore::new(&path).commit(&[bin]).await.unwrap();

        let reopened = CsvBinStore::new(&path);
        let loaded = reopened.find_or_init(&BinKey::new(4, day(2), "pages")).await.unwrap();
        assert!(!loaded.new_record);
        assert_eq!((loaded.views, loaded.participations), (10, 4));
        assert!(!path.with_extension("csv.tmp").exists());
    }

    #[tokio::test]
    async fn test_duplicate_create_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvBinStore::new(dir.path().join("bins.csv"));

        let mut first = RollupBin::initialize(BinKey::new(4, day(2), "pages"));
        first.augment(10, 0);
        let mut racing = RollupBin::initialize(BinKey::new(4, day(2), "pages"));
        racing.augment(3, 0);

        assert_eq!(store.commit(&[first]).await.unwrap(), 1);
        assert_eq!(store.commit(&[racing]).await.unwrap(), 0);
        let bins = store.bins_for_scope(4).await.unwrap();
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].views, 10);
    }

    #[tokio::test]
    async fn test_find_or_init_all_keeps_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvBinStore::new(dir.path().join("bins.csv"));
        let mut stored = RollupBin::initialize(BinKey::new(4, day(2), "pages"));
        stored.augment(10, 4);
        store.commit(&[stored]).await.unwrap();

        let keys = [
            BinKey::new(4, day(2), "quizzes"),
            BinKey::new(4, day(2), "pages"),
        ];
        let bins = store.find_or_init_all(&keys).await.unwrap();
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].key, keys[0]);
        assert!(bins[0].new_record);
        assert_eq!(bins[1].key, keys[1]);
        assert!(!bins[1].new_record);
        assert_eq!(bins[1].views, 10);
    }
}
