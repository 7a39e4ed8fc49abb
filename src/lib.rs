// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod config;
pub mod feed;
pub mod identity;
pub mod leaderboard;
pub mod metrics;
pub mod mindshare;
pub mod model;
pub mod pipeline;
pub mod signal;
pub mod smart;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::ScoringConfig;
pub use crate::feed::{ActivityFeed, InMemoryFeed};
pub use crate::pipeline::Pipeline;
pub use crate::store::SnapshotStore;
