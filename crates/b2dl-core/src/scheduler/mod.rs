//! Batch scheduling.
//!
//! Coordinates a batch of object downloads: sequential metadata fetches, a
//! concurrency gate bounding active pipelines, and first-failure-wins
//! aggregation of results.

mod batch;
mod failure;
mod gate;

pub use batch::{download_batch, resolve_container, BatchDownloader, BatchReport, DEFAULT_THREADS};
pub use failure::FirstFailure;
pub use gate::{ConcurrencyGate, GatePermit};
