//! Core types for region resolution.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Label returned when no bounding box contains a coordinate.
pub const FALLBACK_REGION: &str = "その他地域";

/// A latitude/longitude pair in degrees.
///
/// Only finite values are accepted. Range is not checked: a latitude of 120
/// is a valid `Coordinate` that simply matches no region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !latitude.is_finite() {
            return Err(CoordinateError::NotFinite { axis: "latitude", value: latitude });
        }
        if !longitude.is_finite() {
            return Err(CoordinateError::NotFinite { axis: "longitude", value: longitude });
        }
        Ok(Self { latitude, longitude })
    }

    /// Whether the coordinate lies on the earth's lat/lon grid.
    pub fn is_geographic(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("{axis} must be a finite number, got {value}")]
    NotFinite { axis: &'static str, value: f64 },
}

/// A named rectangle on the lat/lon grid.
///
/// Bounds are inclusive on all four sides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegionBoundingBox {
    /// Stable ASCII identifier (e.g. "aichi").
    pub key: &'static str,
    /// Display name (e.g. "愛知県").
    pub name: &'static str,
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl RegionBoundingBox {
    pub const fn new(
        key: &'static str,
        name: &'static str,
        north: f64,
        south: f64,
        east: f64,
        west: f64,
    ) -> Self {
        Self { key, name, north, south, east, west }
    }

    pub fn is_well_formed(&self) -> bool {
        self.north >= self.south && self.east >= self.west
    }

    pub fn contains(&self, coord: Coordinate) -> bool {
        self.south <= coord.latitude
            && coord.latitude <= self.north
            && self.west <= coord.longitude
            && coord.longitude <= self.east
    }

    pub fn center(&self) -> Coordinate {
        Coordinate {
            latitude: (self.north + self.south) / 2.0,
            longitude: (self.east + self.west) / 2.0,
        }
    }

    pub fn overlaps(&self, other: &RegionBoundingBox) -> bool {
        self.south <= other.north
            && other.south <= self.north
            && self.west <= other.east
            && other.west <= self.east
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegionError {
    #[error("region '{key}' has inverted bounds (north {north} < south {south} or east {east} < west {west})")]
    Malformed {
        key: &'static str,
        north: f64,
        south: f64,
        east: f64,
        west: f64,
    },
}

/// Outcome of a lookup, serialized for the CLI and the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionLookup {
    pub latitude: f64,
    pub longitude: f64,
    pub region: &'static str,
    /// `false` when `region` is the fallback label.
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<&'static str>,
}
