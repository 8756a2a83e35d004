pub mod config;
pub mod driver;
pub mod ingest;
pub mod linker;
pub mod refresh;
pub mod resolver;
pub mod retry;
pub mod service;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use config::ScoutConfig;
pub use linker::GroupingSnapshot;
pub use service::{CycleStats, TopEntry, Toron, DEFAULT_TOP};
