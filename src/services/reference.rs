//! Static city reference data: zone boundaries and green concentration.
//!
//! Zone boundaries come as a GeoJSON `FeatureCollection` whose features carry
//! a `ZONADEC` property and `Polygon` or `MultiPolygon` geometry in
//! `[lon, lat]` order. The green table is a JSON array of
//! `{ "ZONADEC": .., "GreenConc": .. }` rows.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::zones::ZoneLocator;
use crate::models::{GreenTable, GreenZoneEntry, ZoneId, ZonePolygon};

/// Errors that can occur while loading reference data
#[derive(Debug, Error)]
pub enum ReferenceDataError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid geometry for zone {zone}: {reason}")]
    InvalidGeometry { zone: ZoneId, reason: String },

    #[error("Duplicate green value for zone {0}")]
    DuplicateZone(ZoneId),
}

/// Zone polygons plus the green value of each zone
#[derive(Debug, Clone, Default)]
pub struct CityReference {
    pub locator: ZoneLocator,
    pub green: GreenTable,
}

impl CityReference {
    pub fn load(zones_path: &Path, green_path: &Path) -> Result<Self, ReferenceDataError> {
        let zones = load_zone_polygons(zones_path)?;
        let green = load_green_table(green_path)?;

        tracing::info!(
            "Loaded {} zone polygons and {} green values",
            zones.len(),
            green.len()
        );

        Ok(Self {
            locator: ZoneLocator::new(zones),
            green,
        })
    }
}

#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<GeoFeature>,
}

#[derive(Deserialize)]
struct GeoFeature {
    geometry: Geometry,
    properties: ZoneProperties,
}

#[derive(Deserialize)]
struct ZoneProperties {
    #[serde(rename = "ZONADEC")]
    zone: ZoneId,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
}

fn read(path: &Path) -> Result<String, ReferenceDataError> {
    fs::read_to_string(path).map_err(|source| ReferenceDataError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_zone_polygons(path: &Path) -> Result<Vec<ZonePolygon>, ReferenceDataError> {
    parse_zone_polygons(&read(path)?)
}

/// Parse zone polygons, keeping the file order
pub fn parse_zone_polygons(json: &str) -> Result<Vec<ZonePolygon>, ReferenceDataError> {
    let collection: FeatureCollection = serde_json::from_str(json)?;

    collection
        .features
        .into_iter()
        .map(|feature| -> Result<ZonePolygon, ReferenceDataError> {
            let zone = feature.properties.zone;
            let polygons = match feature.geometry {
                Geometry::Polygon { coordinates } => vec![to_polygon(&zone, coordinates)?],
                Geometry::MultiPolygon { coordinates } => coordinates
                    .into_iter()
                    .map(|rings| to_polygon(&zone, rings))
                    .collect::<Result<Vec<_>, _>>()?,
            };
            Ok(ZonePolygon {
                id: zone,
                geometry: MultiPolygon::new(polygons),
            })
        })
        .collect()
}

fn to_polygon(zone: &ZoneId, rings: Vec<Vec<Vec<f64>>>) -> Result<Polygon<f64>, ReferenceDataError> {
    let mut rings = rings
        .into_iter()
        .map(|ring| to_ring(zone, ring))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();

    let exterior = rings.next().ok_or_else(|| ReferenceDataError::InvalidGeometry {
        zone: zone.clone(),
        reason: "polygon has no exterior ring".to_string(),
    })?;

    Ok(Polygon::new(exterior, rings.collect()))
}

fn to_ring(zone: &ZoneId, positions: Vec<Vec<f64>>) -> Result<LineString<f64>, ReferenceDataError> {
    if positions.len() < 4 {
        return Err(ReferenceDataError::InvalidGeometry {
            zone: zone.clone(),
            reason: format!("ring has {} positions, at least 4 required", positions.len()),
        });
    }

    positions
        .into_iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] if x.is_finite() && y.is_finite() => Ok(Coord { x: *x, y: *y }),
            _ => Err(ReferenceDataError::InvalidGeometry {
                zone: zone.clone(),
                reason: format!("invalid position {:?}", position),
            }),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}

pub fn load_green_table(path: &Path) -> Result<GreenTable, ReferenceDataError> {
    parse_green_table(&read(path)?)
}

pub fn parse_green_table(json: &str) -> Result<GreenTable, ReferenceDataError> {
    let entries: Vec<GreenZoneEntry> = serde_json::from_str(json)?;
    let mut values = HashMap::with_capacity(entries.len());

    for entry in entries {
        if values.insert(entry.zone.clone(), entry.green_conc).is_some() {
            return Err(ReferenceDataError::DuplicateZone(entry.zone));
        }
    }

    Ok(GreenTable::new(values))
}
