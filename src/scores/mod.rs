//! Score distributions in bounded memory.

pub mod buckets;
pub mod counter;

pub use buckets::{MAX_BUCKETS, ScoreBuckets};
pub use counter::{ScoreCounter, ScoreSummary};
