//! Zenkoku AI Taxi core: prefecture resolution from coordinates, the
//! location session that feeds it, and the static data the app shows
//! alongside the current region.

pub mod catalog;
pub mod config;
pub mod links;
pub mod location;
pub mod region;
pub mod server;

pub use config::{Config, ConfigError, ProviderKind};
pub use region::{resolve_region, FALLBACK_REGION};
