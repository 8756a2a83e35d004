pub mod config;
pub mod error;
pub mod links;
pub mod staleness;
pub mod title;
pub mod types;

pub use config::Config;
pub use error::ToronError;
pub use links::{extract_links, Service, ServiceType};
pub use staleness::{is_outdated, max_fetch_age};
pub use types::*;
