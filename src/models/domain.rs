use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use validator::Validate;

use crate::core::distance::haversine_distance;
use crate::error::ScoringError;

/// A WGS84 coordinate pair in degrees
///
/// Serialized as `[lat, lon]`. Construction rejects non-finite values and
/// coordinates outside the valid latitude/longitude ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 2]", into = "[f64; 2]")]
pub struct Location {
    lat: f64,
    lon: f64,
}

impl Location {
    pub fn new(lat: f64, lon: f64) -> Result<Self, ScoringError> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);

        if !valid {
            return Err(ScoringError::InvalidLocation { lat, lon });
        }

        Ok(Self { lat, lon })
    }

    #[inline]
    pub fn lat(&self) -> f64 {
        self.lat
    }

    #[inline]
    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Great-circle distance to `other` in kilometers
    #[inline]
    pub fn distance_to(&self, other: &Location) -> f64 {
        haversine_distance(self.lat, self.lon, other.lat, other.lon)
    }
}

impl TryFrom<[f64; 2]> for Location {
    type Error = ScoringError;

    fn try_from(coords: [f64; 2]) -> Result<Self, Self::Error> {
        Self::new(coords[0], coords[1])
    }
}

impl From<Location> for [f64; 2] {
    fn from(location: Location) -> Self {
        [location.lat, location.lon]
    }
}

/// Accommodation listing to be ranked
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Candidate {
    #[validate(length(min = 1))]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub address: String,
    #[validate(range(min = 1))]
    pub price: u32,
    pub coords: Location,
}

/// Office location of a potential employer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployerSite {
    #[serde(default)]
    pub name: Option<String>,
    pub lt: f64,
    pub lg: f64,
}

impl EmployerSite {
    pub fn location(&self) -> Result<Location, ScoringError> {
        Location::new(self.lt, self.lg)
    }
}

/// Employer locations returned for one job-name query
#[derive(Debug, Clone, Default)]
pub struct EmployerSet {
    locations: Vec<Location>,
}

impl EmployerSet {
    pub fn new(locations: Vec<Location>) -> Self {
        Self { locations }
    }

    pub fn from_sites(sites: &[EmployerSite]) -> Result<Self, ScoringError> {
        let locations = sites
            .iter()
            .map(EmployerSite::location)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(locations))
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Component-wise median of latitudes and longitudes
    ///
    /// This is not a geometric median. With an even number of sites the two
    /// middle values are averaged.
    pub fn median_location(&self) -> Result<Location, ScoringError> {
        if self.locations.is_empty() {
            return Err(ScoringError::MissingReferenceData("employer set is empty"));
        }

        let lat = median(self.locations.iter().map(Location::lat).collect());
        let lon = median(self.locations.iter().map(Location::lon).collect());

        Location::new(lat, lon)
    }
}

fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Air-quality station measurement used to train the contamination surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationReading {
    pub lt: f64,
    pub lg: f64,
    pub normv: f64,
}

/// Named area to keep away from, already resolved to coordinates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DangerZone {
    pub name: String,
    pub lt: f64,
    pub lg: f64,
}

impl DangerZone {
    pub fn location(&self) -> Result<Location, ScoringError> {
        Location::new(self.lt, self.lg)
    }
}

/// Administrative zone identifier (the `ZONADEC` field of the boundary file)
///
/// Boundary and green tables disagree on whether the id is numeric or text,
/// so both forms are accepted and stored as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ZoneId(String);

impl ZoneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ZoneId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawZoneId {
            Integer(i64),
            Float(f64),
            Text(String),
        }

        Ok(match RawZoneId::deserialize(deserializer)? {
            RawZoneId::Integer(n) => Self(n.to_string()),
            RawZoneId::Float(f) if f.fract() == 0.0 => Self(format!("{}", f as i64)),
            RawZoneId::Float(f) => Self(f.to_string()),
            RawZoneId::Text(s) => Self(s.trim().to_string()),
        })
    }
}

/// Named administrative boundary
///
/// Geometry coordinates are `x = longitude`, `y = latitude` (GeoJSON order).
#[derive(Debug, Clone)]
pub struct ZonePolygon {
    pub id: ZoneId,
    pub geometry: geo::MultiPolygon<f64>,
}

/// Row of the green-zone reference table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GreenZoneEntry {
    #[serde(rename = "ZONADEC")]
    pub zone: ZoneId,
    #[serde(rename = "GreenConc")]
    pub green_conc: f64,
}

/// Vegetation concentration per zone
#[derive(Debug, Clone, Default)]
pub struct GreenTable {
    values: HashMap<ZoneId, f64>,
}

impl GreenTable {
    pub fn new(values: HashMap<ZoneId, f64>) -> Self {
        Self { values }
    }

    pub fn get(&self, zone: &ZoneId) -> Option<f64> {
        self.values.get(zone).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(ZoneId, f64)> for GreenTable {
    fn from_iter<I: IntoIterator<Item = (ZoneId, f64)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Scored signals, in the order they appear in the feature table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    #[serde(rename = "contamination")]
    Contamination,
    #[serde(rename = "distanceToDangerZone")]
    DistanceToDangerZone,
    #[serde(rename = "distanceToMedianJobLocation")]
    DistanceToMedianJobLocation,
    #[serde(rename = "greenConc")]
    GreenConc,
    #[serde(rename = "price")]
    Price,
}

impl Feature {
    pub const COUNT: usize = 5;

    pub const ALL: [Feature; Feature::COUNT] = [
        Feature::Contamination,
        Feature::DistanceToDangerZone,
        Feature::DistanceToMedianJobLocation,
        Feature::GreenConc,
        Feature::Price,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::Contamination => "contamination",
            Feature::DistanceToDangerZone => "distanceToDangerZone",
            Feature::DistanceToMedianJobLocation => "distanceToMedianJobLocation",
            Feature::GreenConc => "greenConc",
            Feature::Price => "price",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One value per [`Feature`]; `None` marks a missing value
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureVector {
    pub contamination: Option<f64>,
    pub distance_to_danger_zone: Option<f64>,
    pub distance_to_median_job_location: Option<f64>,
    pub green_conc: Option<f64>,
    pub price: Option<f64>,
}

impl FeatureVector {
    pub fn get(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Contamination => self.contamination,
            Feature::DistanceToDangerZone => self.distance_to_danger_zone,
            Feature::DistanceToMedianJobLocation => self.distance_to_median_job_location,
            Feature::GreenConc => self.green_conc,
            Feature::Price => self.price,
        }
    }

    pub fn set(&mut self, feature: Feature, value: Option<f64>) {
        match feature {
            Feature::Contamination => self.contamination = value,
            Feature::DistanceToDangerZone => self.distance_to_danger_zone = value,
            Feature::DistanceToMedianJobLocation => self.distance_to_median_job_location = value,
            Feature::GreenConc => self.green_conc = value,
            Feature::Price => self.price = value,
        }
    }

    pub fn missing(&self) -> Vec<Feature> {
        Feature::ALL
            .into_iter()
            .filter(|feature| self.get(*feature).is_none())
            .collect()
    }
}

/// Raw features derived for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRow {
    pub contamination: f64,
    pub distance_to_danger_zone: f64,
    pub distance_to_median_job_location: f64,
    pub zone: Option<ZoneId>,
    pub green_conc: Option<f64>,
    pub price: f64,
}

impl FeatureRow {
    pub fn vector(&self) -> FeatureVector {
        FeatureVector {
            contamination: Some(self.contamination),
            distance_to_danger_zone: Some(self.distance_to_danger_zone),
            distance_to_median_job_location: Some(self.distance_to_median_job_location),
            green_conc: self.green_conc,
            price: Some(self.price),
        }
    }
}

/// User importance coefficients, one per feature
///
/// Weights must be non-negative; they are not required to sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub price: f64,
    pub work: f64,
    pub danger: f64,
    pub air: f64,
    pub green: f64,
}

impl ScoreWeights {
    pub fn weight(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Contamination => self.air,
            Feature::DistanceToDangerZone => self.danger,
            Feature::DistanceToMedianJobLocation => self.work,
            Feature::GreenConc => self.green,
            Feature::Price => self.price,
        }
    }

    pub fn validate(&self) -> Result<(), ScoringError> {
        for feature in Feature::ALL {
            let weight = self.weight(feature);
            if !weight.is_finite() || weight < 0.0 {
                return Err(ScoringError::InvalidWeights(format!(
                    "weight for {} must be a non-negative number, got {}",
                    feature, weight
                )));
            }
        }
        Ok(())
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            price: 1.0,
            work: 1.0,
            danger: 1.0,
            air: 1.0,
            green: 1.0,
        }
    }
}

/// What happens to candidates whose weighted features are missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingFeaturePolicy {
    /// Drop them from the ranking and report them separately
    #[default]
    Exclude,
    /// Keep them unscored at the bottom of the ranking
    Flag,
}

/// Candidate with its features and final score
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub features: FeatureRow,
    pub scaled: FeatureVector,
    pub score: Option<f64>,
    pub missing_features: Vec<Feature>,
}

/// Candidate removed from the ranking because of missing data
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludedCandidate {
    pub id: String,
    pub zone: Option<ZoneId>,
    pub missing_features: Vec<Feature>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_rejects_out_of_range() {
        assert!(Location::new(45.464, 9.19).is_ok());
        assert!(Location::new(90.5, 9.19).is_err());
        assert!(Location::new(45.0, -180.5).is_err());
        assert!(Location::new(f64::NAN, 9.19).is_err());
    }

    #[test]
    fn test_location_serializes_as_pair() {
        let loc: Location = serde_json::from_str("[45.464, 9.19]").unwrap();
        assert_eq!(loc.lat(), 45.464);
        assert_eq!(loc.lon(), 9.19);
        assert_eq!(serde_json::to_string(&loc).unwrap(), "[45.464,9.19]");

        assert!(serde_json::from_str::<Location>("[145.0, 9.19]").is_err());
    }

    #[test]
    fn test_median_location_odd_and_even() {
        let odd = EmployerSet::new(vec![
            Location::new(45.0, 9.0).unwrap(),
            Location::new(45.5, 9.3).unwrap(),
            Location::new(45.2, 9.1).unwrap(),
        ]);
        let median = odd.median_location().unwrap();
        assert_eq!(median.lat(), 45.2);
        assert_eq!(median.lon(), 9.1);

        let even = EmployerSet::new(vec![
            Location::new(45.0, 9.0).unwrap(),
            Location::new(45.4, 9.2).unwrap(),
        ]);
        let median = even.median_location().unwrap();
        assert!((median.lat() - 45.2).abs() < 1e-12);
        assert!((median.lon() - 9.1).abs() < 1e-12);
    }

    #[test]
    fn test_median_location_empty_set() {
        let err = EmployerSet::default().median_location().unwrap_err();
        assert!(matches!(err, ScoringError::MissingReferenceData(_)));
    }

    #[test]
    fn test_zone_id_accepts_numbers_and_text() {
        let from_int: ZoneId = serde_json::from_str("3").unwrap();
        let from_float: ZoneId = serde_json::from_str("3.0").unwrap();
        let from_text: ZoneId = serde_json::from_str("\" 3 \"").unwrap();
        assert_eq!(from_int, ZoneId::new("3"));
        assert_eq!(from_float, ZoneId::new("3"));
        assert_eq!(from_text, ZoneId::new("3"));
    }

    #[test]
    fn test_weights_validation() {
        assert!(ScoreWeights::default().validate().is_ok());

        let negative = ScoreWeights { danger: -1.0, ..ScoreWeights::default() };
        assert!(matches!(negative.validate(), Err(ScoringError::InvalidWeights(_))));

        let nan = ScoreWeights { air: f64::NAN, ..ScoreWeights::default() };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_feature_vector_missing() {
        let row = FeatureRow {
            contamination: 0.4,
            distance_to_danger_zone: 1.2,
            distance_to_median_job_location: 3.0,
            zone: None,
            green_conc: None,
            price: 900.0,
        };
        assert_eq!(row.vector().missing(), vec![Feature::GreenConc]);
    }
}
