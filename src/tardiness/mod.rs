//! Tardiness classification.
//!
//! A [`Tardy`] classifies one due/submitted pair. A [`TardinessGrid`] computes
//! tardies across the assignment × student cross product once and tallies rows
//! or columns into a [`TardinessBreakdown`].

pub mod breakdown;
pub mod grid;
pub mod tardy;

pub use breakdown::{ScaledBreakdown, TardinessBreakdown};
pub use grid::{Dimension, DueDateResolver, OverrideResolver, TardinessGrid, TardinessGridCoord};
pub use tardy::{Tardy, TardyStatus};
