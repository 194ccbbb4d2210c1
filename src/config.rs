//! Runtime configuration from environment variables and `.env` files.

use chrono_tz::Tz;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::location::providers::{
    DEFAULT_STATIC_ACCURACY, DEFAULT_STATIC_LATITUDE, DEFAULT_STATIC_LONGITUDE,
};
use crate::location::{IpProvider, LocationProvider, LocationSession, Permission, PositionOptions, StaticProvider};
use crate::region::Coordinate;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;

/// Which [`LocationProvider`] backs the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ProviderKind {
    Static,
    Ip,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("cannot read env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub provider: ProviderKind,
    pub static_fix: Coordinate,
    pub static_accuracy: Option<f64>,
    pub permission: Permission,
    pub position_timeout: Duration,
    pub maximum_age: Duration,
    pub display_tz: Tz,
}

impl Default for Config {
    fn default() -> Self {
        let opts = PositionOptions::default();
        Self {
            server_host: DEFAULT_HOST.to_string(),
            server_port: DEFAULT_PORT,
            provider: ProviderKind::Static,
            static_fix: Coordinate {
                latitude: DEFAULT_STATIC_LATITUDE,
                longitude: DEFAULT_STATIC_LONGITUDE,
            },
            static_accuracy: Some(DEFAULT_STATIC_ACCURACY),
            permission: Permission::Granted,
            position_timeout: opts.timeout,
            maximum_age: opts.maximum_age,
            display_tz: chrono_tz::Asia::Tokyo,
        }
    }
}

impl Config {
    /// Load from the process environment, after applying `./.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from a specific `.env` file without touching the process environment.
    pub fn from_env_file(path: &Path) -> Result<Self, ConfigError> {
        let mut vars = HashMap::new();
        for item in dotenvy::from_path_iter(path)? {
            let (k, v) = item?;
            vars.insert(k, v);
        }
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &'static str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let server_host = get("ZENKOKU_HOST").unwrap_or(defaults.server_host);
        let server_port = parse_or("ZENKOKU_PORT", get("ZENKOKU_PORT"), defaults.server_port)?;

        let provider = match get("ZENKOKU_PROVIDER") {
            None => defaults.provider,
            Some(v) => match v.to_lowercase().as_str() {
                "static" => ProviderKind::Static,
                "ip" => ProviderKind::Ip,
                _ => return Err(invalid("ZENKOKU_PROVIDER", v, "expected 'static' or 'ip'")),
            },
        };

        let lat = parse_or("ZENKOKU_STATIC_LAT", get("ZENKOKU_STATIC_LAT"), defaults.static_fix.latitude)?;
        let lon = parse_or("ZENKOKU_STATIC_LON", get("ZENKOKU_STATIC_LON"), defaults.static_fix.longitude)?;
        let static_fix = Coordinate::new(lat, lon)
            .map_err(|e| invalid("ZENKOKU_STATIC_LAT/LON", format!("{}, {}", lat, lon), e.to_string()))?;

        let static_accuracy = match get("ZENKOKU_STATIC_ACCURACY") {
            None => defaults.static_accuracy,
            Some(v) if v.eq_ignore_ascii_case("unknown") => None,
            Some(v) => Some(parse("ZENKOKU_STATIC_ACCURACY", v)?),
        };

        let permission = match get("ZENKOKU_PERMISSION") {
            None => defaults.permission,
            Some(v) => match v.to_lowercase().as_str() {
                "granted" => Permission::Granted,
                "denied" => Permission::Denied,
                _ => return Err(invalid("ZENKOKU_PERMISSION", v, "expected 'granted' or 'denied'")),
            },
        };

        let timeout_ms = parse_or(
            "ZENKOKU_POSITION_TIMEOUT_MS",
            get("ZENKOKU_POSITION_TIMEOUT_MS"),
            defaults.position_timeout.as_millis() as u64,
        )?;
        if timeout_ms == 0 {
            return Err(invalid("ZENKOKU_POSITION_TIMEOUT_MS", "0".into(), "must be positive"));
        }
        let max_age_ms = parse_or(
            "ZENKOKU_MAX_AGE_MS",
            get("ZENKOKU_MAX_AGE_MS"),
            defaults.maximum_age.as_millis() as u64,
        )?;

        let display_tz = match get("ZENKOKU_TZ") {
            None => defaults.display_tz,
            Some(v) => v
                .parse::<Tz>()
                .map_err(|_| invalid("ZENKOKU_TZ", v.clone(), "unknown IANA time zone"))?,
        };

        Ok(Self {
            server_host,
            server_port,
            provider,
            static_fix,
            static_accuracy,
            permission,
            position_timeout: Duration::from_millis(timeout_ms),
            maximum_age: Duration::from_millis(max_age_ms),
            display_tz,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn position_options(&self) -> PositionOptions {
        PositionOptions {
            timeout: self.position_timeout,
            maximum_age: self.maximum_age,
        }
    }

    pub fn build_provider(&self) -> Arc<dyn LocationProvider> {
        match self.provider {
            ProviderKind::Static => Arc::new(
                StaticProvider::new(self.static_fix, self.static_accuracy).with_permission(self.permission),
            ),
            ProviderKind::Ip => Arc::new(IpProvider::new()),
        }
    }

    pub fn build_session(&self) -> LocationSession {
        LocationSession::new(self.build_provider(), self.position_options()).with_display_tz(self.display_tz)
    }
}

fn invalid(key: &'static str, value: String, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value,
        reason: reason.into(),
    }
}

fn parse<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| {
        let reason = e.to_string();
        invalid(key, value, reason)
    })
}

fn parse_or<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => parse(key, v),
        None => Ok(default),
    }
}
