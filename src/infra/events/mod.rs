//! [`EventSource`](crate::services::EventSource) implementations.

mod csv_file;
mod memory;

pub use csv_file::CsvEventSource;
pub use memory::MemoryEventSource;
