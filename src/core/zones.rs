use geo::{Contains, Point};

use crate::models::{Location, ZoneId, ZonePolygon};

/// Point-in-polygon lookup over the city's administrative zones
///
/// Zone geometry is in GeoJSON axis order (`x = lon`, `y = lat`), so the probe
/// point is built as `(lon, lat)`. When zones overlap, the first zone in load
/// order wins and a warning is logged.
#[derive(Debug, Clone, Default)]
pub struct ZoneLocator {
    zones: Vec<ZonePolygon>,
}

impl ZoneLocator {
    pub fn new(zones: Vec<ZonePolygon>) -> Self {
        Self { zones }
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Zone strictly containing `location`, or `None` when it lies outside
    /// every known polygon
    pub fn locate(&self, location: &Location) -> Option<&ZoneId> {
        let point = Point::new(location.lon(), location.lat());
        let mut containing = self
            .zones
            .iter()
            .filter(|zone| zone.geometry.contains(&point));

        let first = containing.next()?;
        if let Some(other) = containing.next() {
            tracing::warn!(
                "Location ({}, {}) lies in overlapping zones {} and {}; using {}",
                location.lat(),
                location.lon(),
                first.id,
                other.id,
                first.id
            );
        }

        Some(&first.id)
    }
}
