//! Region resolution: maps a coordinate to the prefecture that contains it.
//!
//! The lookup is a linear scan over a static table of bounding boxes;
//! first match in table order wins, and anything unmatched resolves to
//! the fallback label.

pub mod table;
pub mod types;

pub use table::{resolve_region, RegionTable, REGIONS};
pub use types::{Coordinate, CoordinateError, RegionBoundingBox, RegionError, RegionLookup, FALLBACK_REGION};
