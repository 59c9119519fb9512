//! budgetrack keeps a budget tracker's cached spending totals honest.
//!
//! Charges are the source of truth. Each category caches the sum of its
//! charges and each user caches the sum of their categories; both caches are
//! rebuilt by [`SummaryEngine::recompute_summary`], which also returns the
//! composed [`Summary`] the rest of the application renders.

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod store;

pub use engine::{RequestContext, Stage, SummaryEngine};
pub use error::{StoreError, SummaryError};
pub use models::Summary;
pub use store::{Consistency, DocumentStore, RecordStore, SqliteStore, SummaryStore};
