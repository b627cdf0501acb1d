//! Cache Module
//!
//! Node-local storage with TTL expiration, plus lookup statistics.

mod entry;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use stats::{CacheStats, StatsRecorder};
pub use store::LocalStore;
