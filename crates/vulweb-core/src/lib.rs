pub mod config;
pub mod error;
pub mod platform;
pub mod types;

pub use config::VulwebConfig;
pub use error::{Result, VulwebError};
pub use platform::{InMemoryPlatform, PlatformCounts, PlatformQuery, PlatformSnapshot};
pub use types::*;
