//! Location subsystem.
//!
//! Providers produce fixes, the session turns them into resolved
//! [`LocationReport`]s and tracks the user-visible status.

pub mod providers;
pub mod session;
pub mod types;

pub use providers::{IpProvider, LocationProvider, StaticProvider};
pub use session::LocationSession;
pub use types::{Fix, FixSource, LocationError, LocationReport, LocationStatus, Permission, PositionOptions};
