//! Location providers: a fixed position and IP-based geolocation.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::io::ErrorKind;
use std::time::Instant;

use super::types::{Fix, FixSource, LocationError, Permission, PositionOptions};
use crate::region::Coordinate;

/// Source of device positions.
///
/// Implementations may block; callers on an async runtime should move the
/// call onto a blocking thread.
pub trait LocationProvider: Send + Sync {
    /// Ask for permission to read the position. May wait on the user.
    fn request_permission(&self) -> Permission;

    /// Fetch one position, giving up after `opts.timeout`.
    fn current_position(&self, opts: &PositionOptions) -> Result<Fix, LocationError>;
}

// ─── Static provider ────────────────────────────────────────────

/// Default position reported when nothing else is configured (Nagoya).
pub const DEFAULT_STATIC_LATITUDE: f64 = 35.1815;
pub const DEFAULT_STATIC_LONGITUDE: f64 = 136.9066;
pub const DEFAULT_STATIC_ACCURACY: f64 = 2.1;

/// Always reports the same coordinate, stamped with the current time.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    coord: Coordinate,
    accuracy: Option<f64>,
    permission: Permission,
}

impl StaticProvider {
    pub fn new(coord: Coordinate, accuracy: Option<f64>) -> Self {
        Self {
            coord,
            accuracy,
            permission: Permission::Granted,
        }
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permission = permission;
        self
    }
}

impl Default for StaticProvider {
    fn default() -> Self {
        Self::new(
            Coordinate {
                latitude: DEFAULT_STATIC_LATITUDE,
                longitude: DEFAULT_STATIC_LONGITUDE,
            },
            Some(DEFAULT_STATIC_ACCURACY),
        )
    }
}

impl LocationProvider for StaticProvider {
    fn request_permission(&self) -> Permission {
        self.permission
    }

    fn current_position(&self, _opts: &PositionOptions) -> Result<Fix, LocationError> {
        Ok(Fix {
            latitude: self.coord.latitude,
            longitude: self.coord.longitude,
            accuracy: self.accuracy,
            timestamp: Utc::now(),
            source: FixSource::Static,
        })
    }
}

// ─── IP-based geolocation ───────────────────────────────────────

pub const IPAPI_ENDPOINT: &str = "https://ipapi.co/json/";

#[derive(Deserialize, Debug)]
struct IpApiResult {
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default)]
    error: bool,
    reason: Option<String>,
}

/// Approximate position from the public IP address.
///
/// No permission prompt is involved, so permission is always granted.
#[derive(Debug, Clone)]
pub struct IpProvider {
    endpoint: String,
    user_agent: String,
}

impl IpProvider {
    pub fn new() -> Self {
        Self::with_endpoint(IPAPI_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            user_agent: format!("ZenkokuTaxi/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for IpProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationProvider for IpProvider {
    fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn current_position(&self, opts: &PositionOptions) -> Result<Fix, LocationError> {
        let start = Instant::now();
        let response = ureq::get(&self.endpoint)
            .set("User-Agent", &self.user_agent)
            .timeout(opts.timeout)
            .call()
            .map_err(|e| {
                if start.elapsed() >= opts.timeout || is_timeout(&e) {
                    LocationError::Timeout(opts.timeout)
                } else {
                    LocationError::Unavailable(e.to_string())
                }
            })?;

        let r: IpApiResult = response
            .into_json()
            .map_err(|e| LocationError::InvalidResponse(e.to_string()))?;

        fix_from_ip_result(r, Utc::now())
    }
}

fn is_timeout(e: &ureq::Error) -> bool {
    let ureq::Error::Transport(t) = e else {
        return false;
    };
    std::error::Error::source(t)
        .and_then(|s| s.downcast_ref::<std::io::Error>())
        .is_some_and(|io| matches!(io.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock))
}

fn fix_from_ip_result(r: IpApiResult, now: DateTime<Utc>) -> Result<Fix, LocationError> {
    if r.error {
        return Err(LocationError::Unavailable(
            r.reason.unwrap_or_else(|| "geolocation service refused the request".into()),
        ));
    }
    let lat = r.latitude.ok_or_else(|| LocationError::InvalidResponse("no latitude".into()))?;
    let lon = r.longitude.ok_or_else(|| LocationError::InvalidResponse("no longitude".into()))?;
    let coord = Coordinate::new(lat, lon)?;

    Ok(Fix {
        latitude: coord.latitude,
        longitude: coord.longitude,
        // IP geolocation has no meaningful accuracy radius.
        accuracy: None,
        timestamp: now,
        source: FixSource::IpApi,
    })
}
