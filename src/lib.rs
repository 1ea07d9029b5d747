// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod aggregator;
pub mod analyzer;
pub mod api;
pub mod collector;
pub mod config;
pub mod dedup;
pub mod lexicon;
pub mod metrics;
pub mod orchestrator;
pub mod reliability;
pub mod sources;
pub mod store;
pub mod summary;
pub mod trend;
pub mod types;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::sources::{AdapterRegistry, SourceAdapter};
pub use crate::store::{HistoryStore, JsonFileStore, MemoryStore};
pub use crate::types::{MoodType, SentimentBreakdown, SentimentDataPoint};
