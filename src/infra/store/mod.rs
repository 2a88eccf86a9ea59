//! [`BinStore`](crate::services::BinStore) implementations.
//!
//! [`MemoryBinStore`] keeps bins in process memory.
//! [`CsvBinStore`] persists them to a CSV file with whole-file atomic replacement.

mod csv_file;
mod memory;

pub use csv_file::CsvBinStore;
pub use memory::MemoryBinStore;
