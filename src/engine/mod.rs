//! External collaborator contracts and test doubles
//!
//! The reader core never talks to a search index or column store directly;
//! it goes through the async traits in [`traits`]. Production implementations
//! wrap the actual backends and live outside this crate; [`stubs`] provides
//! in-memory doubles for tests and prototyping.

pub mod stats;
pub mod stubs;
pub mod traits;

pub use stats::{NoopStatsService, PrometheusStatsService};
pub use traits::{IndexService, StatsService, StoreService};
