//! Durable single-slot job store (SQLite via sqlx).
//!
//! Holds at most one job, serialized as a JSON blob under a fixed key, so a
//! torn-down host process can rebuild the in-progress job exactly.

mod db;

#[cfg(test)]
mod tests;

pub use db::{JobStore, JOB_KEY};

#[cfg(test)]
pub(crate) use db::open_memory;
