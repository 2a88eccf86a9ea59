pub mod cache;
pub mod config;
pub mod error;
pub mod infra;
pub mod output;
pub mod parser;
pub mod rollups;
pub mod scores;
pub mod services;
pub mod stats;
pub mod tardiness;
pub mod types;

pub use error::{AnalyticsError, Result};
