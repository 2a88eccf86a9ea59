use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;
use tokio::sync::Mutex;

use crate::rollups::types::PageView;
use crate::services::EventSource;

/// Page views held in process memory.
#[derive(Debug, Default)]
pub struct MemoryEventSource {
    records: Mutex<Vec<PageView>>,
}

impl MemoryEventSource {
    pub fn new(records: Vec<PageView>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    pub async fn push(&self, record: PageView) {
        self.records.lock().await.push(record);
    }

    /// Snapshot of every record, summarized or not.
    pub async fn records(&self) -> Vec<PageView> {
        self.records.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl EventSource for MemoryEventSource {
    async fn earliest_unprocessed(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Option<DateTime<Utc>>> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .filter(|r| !r.summarized)
            .map(|r| r.created_at)
            .filter(|at| (from..until).contains(&at.date_naive()))
            .min())
    }

    async fn latest_record_at(&self) -> Result<Option<DateTime<Utc>>> {
        let records = self.records.lock().await;
        Ok(records.iter().map(|r| r.created_at).max())
    }

    async fn unprocessed_on(&self, day: NaiveDate) -> Result<Vec<PageView>> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .filter(|r| !r.summarized && r.created_at.date_naive() == day)
            .cloned()
            .collect())
    }

    async fn mark_summarized(&self, day: NaiveDate, request_ids: &[String]) -> Result<()> {
        let ids: HashSet<&str> = request_ids.iter().map(String::as_str).collect();
        let mut records = self.records.lock().await;
        for record in records
            .iter_mut()
            .filter(|r| r.created_at.date_naive() == day && ids.contains(r.request_id.as_str()))
        {
            record.summarized = true;
        }
        Ok(())
    }
}
