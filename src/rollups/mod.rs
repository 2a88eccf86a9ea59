//! Persisted rollups: per-section assignment rows, their course-level
//! aggregate, and the daily page-view bins.

pub mod aggregate;
pub mod category;
pub mod driver;
pub mod types;

pub use aggregate::{AssignmentRollupAggregate, aggregate_rollups};
pub use category::CategoryTaxonomy;
pub use driver::RollupDriver;
pub use types::{AssignmentRollup, BinKey, PageView, RollupBin, RunReport};
