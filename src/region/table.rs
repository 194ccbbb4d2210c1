//! The built-in prefecture table and first-match lookup.

use super::types::{Coordinate, RegionBoundingBox, RegionError, RegionLookup, FALLBACK_REGION};

// ─── Built-in dataset ───────────────────────────────────────────

/// Supported prefectures, in lookup order.
pub static REGIONS: [RegionBoundingBox; 5] = [
    RegionBoundingBox::new("hokkaido", "北海道", 45.6, 41.3, 145.8, 139.3),
    RegionBoundingBox::new("tokyo", "東京都", 35.9, 35.5, 139.9, 138.9),
    RegionBoundingBox::new("aichi", "愛知県", 35.4, 34.5, 137.6, 136.7),
    RegionBoundingBox::new("osaka", "大阪府", 35.1, 34.2, 135.7, 135.1),
    RegionBoundingBox::new("fukuoka", "福岡県", 34.0, 33.0, 131.2, 130.0),
];

/// Resolve a coordinate against the built-in table.
///
/// Always returns a display label. Coordinates outside every box, including
/// out-of-range or NaN input, resolve to [`FALLBACK_REGION`].
pub fn resolve_region(latitude: f64, longitude: f64) -> &'static str {
    RegionTable::builtin().resolve(latitude, longitude)
}

// ─── Table ──────────────────────────────────────────────────────

/// An ordered, read-only list of bounding boxes.
#[derive(Debug, Clone, Copy)]
pub struct RegionTable {
    entries: &'static [RegionBoundingBox],
}

impl RegionTable {
    pub fn builtin() -> Self {
        Self { entries: &REGIONS }
    }

    /// Build a table from custom entries, rejecting inverted bounds.
    pub fn new(entries: &'static [RegionBoundingBox]) -> Result<Self, RegionError> {
        if let Some(b) = entries.iter().find(|b| !b.is_well_formed()) {
            return Err(RegionError::Malformed {
                key: b.key,
                north: b.north,
                south: b.south,
                east: b.east,
                west: b.west,
            });
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &'static [RegionBoundingBox] {
        self.entries
    }

    /// Return the first entry, in table order, whose closed box contains
    /// `coord`. When boxes overlap the earlier entry wins.
    pub fn find(&self, coord: Coordinate) -> Option<&'static RegionBoundingBox> {
        self.entries.iter().find(|b| b.contains(coord))
    }

    pub fn resolve(&self, latitude: f64, longitude: f64) -> &'static str {
        self.lookup(latitude, longitude).region
    }

    pub fn lookup(&self, latitude: f64, longitude: f64) -> RegionLookup {
        let hit = self.find(Coordinate { latitude, longitude });
        tracing::debug!(latitude, longitude, region = hit.map(|b| b.key), "region lookup");
        RegionLookup {
            latitude,
            longitude,
            region: hit.map_or(FALLBACK_REGION, |b| b.name),
            matched: hit.is_some(),
            key: hit.map(|b| b.key),
        }
    }
}

impl Default for RegionTable {
    fn default() -> Self {
        Self::builtin()
    }
}
