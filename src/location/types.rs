//! Core types for the location subsystem.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::region::{Coordinate, CoordinateError};

/// Where a fix came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixSource {
    Static,
    IpApi,
}

impl fmt::Display for FixSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => write!(f, "Static"),
            Self::IpApi => write!(f, "IP"),
        }
    }
}

/// A single reported position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in metres, when the provider knows it.
    pub accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub source: FixSource,
}

impl Fix {
    pub fn coordinate(&self) -> Result<Coordinate, CoordinateError> {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Age of the fix relative to `now`. Fixes stamped in the future count as fresh.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.timestamp).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Answer to a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
}

/// Limits applied to a position request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    /// Give up on the provider after this long.
    pub timeout: Duration,
    /// A previous fix younger than this is reused instead of fetching.
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(15_000),
            maximum_age: Duration::from_millis(10_000),
        }
    }
}

/// A fix together with the region it resolved to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationReport {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub region: &'static str,
    pub matched: bool,
    pub source: FixSource,
    pub timestamp: DateTime<Utc>,
    /// Fix time rendered in the display time zone.
    pub local_time: String,
    /// Whether this report reused a previous fix.
    pub reused: bool,
}

impl LocationReport {
    pub fn display_line(&self) -> String {
        let accuracy = match self.accuracy {
            Some(a) => format!("±{}m", a),
            None => "±?m".to_string(),
        };
        format!(
            "\u{1F4CD} {}\n  \u{1F4D0} {:.6}, {:.6} ({})\n  \u{1F552} {}",
            self.region, self.latitude, self.longitude, accuracy, self.local_time
        )
    }
}

pub(crate) fn render_local_time(ts: DateTime<Utc>, tz: Tz) -> String {
    ts.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S %Z").to_string()
}

/// Observable state of a [`super::LocationSession`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LocationStatus {
    Idle,
    RequestingPermission,
    Fetching,
    Ready { report: LocationReport },
    PermissionDenied,
    Failed { reason: String },
}

/// Location errors. Each one ends the attempt; there is no automatic retry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("position unavailable: {0}")]
    Unavailable(String),
    #[error("invalid location response: {0}")]
    InvalidResponse(String),
    #[error(transparent)]
    InvalidCoordinate(#[from] CoordinateError),
    #[error("a location request is already in flight")]
    InFlight,
}
