//! Concrete storage behind the service contracts.

pub mod events;
pub mod store;
