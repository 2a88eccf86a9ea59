//! Incremental page-view rollup.
//!
//! Raw page views are folded into per-(course, day, category) bins one day at
//! a time, newest first. There is no separate job-state table: a bin that
//! already exists marks its key as done, so re-running is always safe and an
//! interrupted run is finished by the next one.

use chrono::{Months, NaiveDate};
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::RollupConfig;
use crate::error::{AnalyticsError, Result};
use crate::rollups::types::{BinKey, ChunkReport, RunReport};
use crate::services::{BinStore, EventSource};

pub struct RollupDriver<E, B> {
    events: E,
    bins: B,
    config: RollupConfig,
    running: Mutex<()>,
}

#[derive(Default)]
struct GroupCounts {
    views: u64,
    participations: u64,
}

fn transient(day: NaiveDate) -> impl FnOnce(anyhow::Error) -> AnalyticsError {
    move |e| AnalyticsError::TransientIo {
        day,
        message: format!("{e:#}"),
    }
}

impl<E: EventSource, B: BinStore> RollupDriver<E, B> {
    pub fn new(events: E, bins: B, config: RollupConfig) -> Self {
        Self {
            events,
            bins,
            config,
            running: Mutex::new(()),
        }
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn bins(&self) -> &B {
        &self.bins
    }

    pub fn config(&self) -> &RollupConfig {
        &self.config
    }

    /// Rolls up everything between the earliest unprocessed record and the
    /// first day that already has bins (or `today`).
    #[tracing::instrument(skip(self), fields(dry_run = self.config.dry_run))]
    pub async fn run(&self, today: NaiveDate) -> Result<RunReport> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("Rollup already in progress, skipping this run");
            return Ok(RunReport {
                overlapping: true,
                dry_run: self.config.dry_run,
                ..Default::default()
            });
        };

        let mut report = RunReport {
            dry_run: self.config.dry_run,
            ..Default::default()
        };

        let Some(start) = self.start_date(today).await? else {
            info!("No unprocessed records, nothing to roll up");
            return Ok(report);
        };
        let end = self.end_date(start, today).await?;
        report.start = Some(start);
        report.end = Some(end);
        info!(%start, %end, "Starting rollup");

        let mut day = end;
        while day >= start {
            let chunk = self.process_day(day).await?;
            report.absorb(chunk);
            match day.pred_opt() {
                Some(previous) => day = previous,
                None => break,
            }
        }

        info!(
            days = report.days_processed,
            records = report.records_seen,
            created = report.bins_created,
            skipped = report.bins_skipped,
            "Rollup complete"
        );
        Ok(report)
    }

    /// Date of the earliest unprocessed record, found by probing month-sized
    /// windows forward from the configured epoch.
    pub async fn start_date(&self, today: NaiveDate) -> Result<Option<NaiveDate>> {
        let mut from = self.config.epoch;
        while from <= today {
            let Some(until) = from.checked_add_months(Months::new(1)) else {
                break;
            };
            let earliest = self
                .events
                .earliest_unprocessed(from, until)
                .await
                .map_err(transient(from))?;
            if let Some(at) = earliest {
                debug!(window = %from, earliest = %at, "Found unprocessed records");
                return Ok(Some(at.date_naive()));
            }
            from = until;
        }
        Ok(None)
    }

    /// Last day to process: today, capped by the newest record and by the
    /// first day on or after `start` that already has bins.
    pub async fn end_date(&self, start: NaiveDate, today: NaiveDate) -> Result<NaiveDate> {
        let mut end = today;
        if let Some(latest) = self
            .events
            .latest_record_at()
            .await
            .map_err(transient(start))?
        {
            end = end.min(latest.date_naive());
        }
        if let Some(existing) = self
            .bins
            .earliest_date_on_or_after(start)
            .await
            .map_err(transient(start))?
        {
            debug!(%existing, "Existing bins found, capping end");
            end = end.min(existing);
        }
        Ok(end.max(start))
    }

    /// Rolls up one day as a single commit.
    pub async fn process_day(&self, day: NaiveDate) -> Result<ChunkReport> {
        let records = self
            .events
            .unprocessed_on(day)
            .await
            .map_err(transient(day))?;
        if records.is_empty() {
            debug!(%day, "No records for day");
            return Ok(ChunkReport::default());
        }

        let mut groups: BTreeMap<(u64, &str), GroupCounts> = BTreeMap::new();
        for record in &records {
            let category = self.config.taxonomy.categorize(&record.controller);
            let counts = groups.entry((record.context_id, category)).or_default();
            counts.views += 1;
            if record.participated {
                counts.participations += 1;
            }
        }

        let mut report = ChunkReport {
            records: records.len(),
            ..Default::default()
        };
        let keys: Vec<BinKey> = groups
            .keys()
            .map(|&(scope_id, category)| BinKey::new(scope_id, day, category))
            .collect();
        let found = self
            .bins
            .find_or_init_all(&keys)
            .await
            .map_err(transient(day))?;

        let mut fresh = Vec::new();
        for (mut bin, counts) in found.into_iter().zip(groups.into_values()) {
            if !bin.new_record {
                report.skipped += 1;
                continue;
            }
            bin.augment(counts.views, counts.participations);
            fresh.push(bin);
        }
        report.created = fresh.len();

        if self.config.dry_run {
            info!(%day, records = report.records, would_create = report.created, skipped = report.skipped, "Dry run, nothing saved");
            return Ok(report);
        }

        self.bins.commit(&fresh).await.map_err(transient(day))?;

        if self.config.mark_summarized {
            let ids: Vec<String> = records.into_iter().map(|r| r.request_id).collect();
            self.events
                .mark_summarized(day, &ids)
                .await
                .map_err(transient(day))?;
        }

        info!(
            %day,
            records = report.records,
            created = report.created,
            skipped = report.skipped,
            "Rolled up day"
        );
        Ok(report)
    }
}
