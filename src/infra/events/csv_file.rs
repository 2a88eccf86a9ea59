use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use crate::rollups::types::PageView;
use crate::services::EventSource;

/// Reads page views from a directory of per-day CSV files.
///
/// Files are named `date=YYYY-MM-DD.csv`, or `date=YYYY-MM-DD.csv.gz` when
/// gzip-compressed. Marking records summarized rewrites the day's file in
/// the same format.
pub struct CsvEventSource {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl CsvEventSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    /// Day files present in the directory, keyed by date.
    fn day_files(&self) -> Result<BTreeMap<NaiveDate, PathBuf>> {
        let mut files = BTreeMap::new();
        if !self.dir.exists() {
            return Ok(files);
        }

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(date) = entry.file_name().to_str().and_then(parse_day_file_name) {
                files.insert(date, entry.path());
            }
        }
        Ok(files)
    }

    /// Writes `records` as the file for `day`, replacing any existing one.
    pub fn write_day(&self, day: NaiveDate, records: &[PageView], gzip: bool) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let suffix = if gzip { ".csv.gz" } else { ".csv" };
        let path = self.dir.join(format!("date={}{}", day.format("%Y-%m-%d"), suffix));
        write_day_file(&path, records)?;
        Ok(path)
    }

    fn day_file(&self, day: NaiveDate) -> Result<Option<PathBuf>> {
        Ok(self.day_files()?.remove(&day))
    }

    fn unprocessed_in(&self, path: &Path) -> Result<Vec<PageView>> {
        Ok(read_day_file(path)?
            .into_iter()
            .filter(|r| !r.summarized)
            .collect())
    }
}

fn parse_day_file_name(name: &str) -> Option<NaiveDate> {
    let stem = name
        .strip_prefix("date=")?
        .strip_suffix(".csv.gz")
        .or_else(|| name.strip_prefix("date=")?.strip_suffix(".csv"))?;
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}

fn is_gzip(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("gz")
}

fn read_day_file(path: &Path) -> Result<Vec<PageView>> {
    let raw = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let bytes = if is_gzip(path) {
        let mut decoded = Vec::new();
        GzDecoder::new(raw.as_slice()).read_to_end(&mut decoded)?;
        decoded
    } else {
        raw
    };

    let mut rdr = csv::Reader::from_reader(bytes.as_slice());
    let mut records = Vec::new();
    for result in rdr.deserialize() {
        let record: PageView = result?;
        records.push(record);
    }
    Ok(records)
}

fn write_day_file(path: &Path, records: &[PageView]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(record)?;
    }
    let contents = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("flushing CSV for {}: {}", path.display(), e.error()))?;

    let body = if is_gzip(path) {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&contents)?;
        encoder.finish()?
    } else {
        contents
    };

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, body)?;
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

#[async_trait::async_trait]
impl EventSource for CsvEventSource {
    async fn earliest_unprocessed(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Option<DateTime<Utc>>> {
        let _guard = self.lock.lock().await;
        for (_, path) in self.day_files()?.range(from..until) {
            let earliest = self
                .unprocessed_in(path)?
                .into_iter()
                .map(|r| r.created_at)
                .min();
            if earliest.is_some() {
                return Ok(earliest);
            }
        }
        Ok(None)
    }

    async fn latest_record_at(&self) -> Result<Option<DateTime<Utc>>> {
        let _guard = self.lock.lock().await;
        for path in self.day_files()?.values().rev() {
            let latest = read_day_file(path)?.into_iter().map(|r| r.created_at).max();
            if latest.is_some() {
                return Ok(latest);
            }
        }
        Ok(None)
    }

    async fn unprocessed_on(&self, day: NaiveDate) -> Result<Vec<PageView>> {
        let _guard = self.lock.lock().await;
        match self.day_file(day)? {
            Some(path) => self.unprocessed_in(&path),
            None => Ok(Vec::new()),
        }
    }

    async fn mark_summarized(&self, day: NaiveDate, request_ids: &[String]) -> Result<()> {
        let _guard = self.lock.lock().await;
        let Some(path) = self.day_file(day)? else {
            return Ok(());
        };

        let ids: HashSet<&str> = request_ids.iter().map(String::as_str).collect();
        let mut records = read_day_file(&path)?;
        let mut marked = 0;
        for record in records.iter_mut().filter(|r| ids.contains(r.request_id.as_str())) {
            record.summarized = true;
            marked += 1;
        }
        write_day_file(&path, &records)?;
        debug!(path = %path.display(), marked, "Marked records summarized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    fn view(id: &str, d: u32, hour: u32) -> PageView {
        PageView {
            request_id: id.to_string(),
            context_id: 1,
            user_id: 2,
            created_at: Utc.with_ymd_and_hms(2024, 4, d, hour, 0, 0).unwrap(),
            controller: "files".to_string(),
            participated: false,
            summarized: false,
        }
    }

    #[test]
    fn test_parse_day_file_name() {
        assert_eq!(parse_day_file_name("date=2024-04-03.csv"), Some(day(3)));
        assert_eq!(parse_day_file_name("date=2024-04-03.csv.gz"), Some(day(3)));
        assert_eq!(parse_day_file_name("notes.txt"), None);
        assert_eq!(parse_day_file_name("date=yesterday.csv"), None);
    }

    #[tokio::test]
    async fn test_reads_plain_and_gzip_days() {
        let dir = tempfile::tempdir().unwrap();
        write_day_file(&dir.path().join("date=2024-04-03.csv"), &[view("a", 3, 8), view("b", 3, 6)]).unwrap();
        write_day_file(&dir.path().join("date=2024-04-05.csv.gz"), &[view("c", 5, 7)]).unwrap();

        let source = CsvEventSource::new(dir.path());
        assert_eq!(
            source.earliest_unprocessed(day(1), day(30)).await.unwrap(),
            Some(view("b", 3, 6).created_at)
        );
        assert_eq!(
            source.latest_record_at().await.unwrap(),
            Some(view("c", 5, 7).created_at)
        );
        assert_eq!(source.unprocessed_on(day(5)).await.unwrap().len(), 1);
        assert!(source.unprocessed_on(day(4)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_summarized_rewrites_day() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("date=2024-04-05.csv.gz");
        write_day_file(&path, &[view("a", 5, 1), view("b", 5, 2)]).unwrap();

        let source = CsvEventSource::new(dir.path());
        source.mark_summarized(day(5), &["a".to_string()]).await.unwrap();

        let left = source.unprocessed_on(day(5)).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].request_id, "b");
        assert_eq!(read_day_file(&path).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_directory_has_no_records() {
        let source = CsvEventSource::new("/nonexistent/page_views");
        assert_eq!(source.latest_record_at().await.unwrap(), None);
        assert_eq!(source.earliest_unprocessed(day(1), day(2)).await.unwrap(), None);
    }
}
