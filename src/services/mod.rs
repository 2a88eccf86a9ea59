//! Contracts for the storage collaborators the rollup driver depends on.

pub mod bin_store;
pub mod event_source;

pub use bin_store::BinStore;
pub use event_source::EventSource;
