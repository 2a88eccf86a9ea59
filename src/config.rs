use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::rollups::category::CategoryTaxonomy;

/// Settings for the page-view rollup driver.
///
/// Stored as a JSON object on disk; every field is optional:
/// ```json
/// {
///   "epoch": "2011-01-01",
///   "mark_summarized": true,
///   "taxonomy": {
///     "categories": { "wiki_pages": "pages", "files": "files" },
///     "default_category": "other"
///   }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RollupConfig {
    /// No records older than this are looked for.
    pub epoch: NaiveDate,
    pub taxonomy: CategoryTaxonomy,
    /// Flag source records once their day has been rolled up.
    pub mark_summarized: bool,
    /// Compute and log, but persist nothing.
    #[serde(skip)]
    pub dry_run: bool,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            epoch: NaiveDate::from_ymd_opt(2011, 1, 1).unwrap_or_default(),
            taxonomy: CategoryTaxonomy::default(),
            mark_summarized: true,
            dry_run: false,
        }
    }
}

impl RollupConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading rollup config '{path}'"))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("parsing rollup config '{path}'"))?;
        Ok(config)
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}
