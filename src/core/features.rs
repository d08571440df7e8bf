use crate::core::contamination::FittedSurface;
use crate::core::distance::nearest_distance;
use crate::error::ScoringError;
use crate::models::{Candidate, EmployerSet, FeatureRow, Location};
use crate::services::CityReference;

/// Derives the raw feature row of each candidate
///
/// Holds only read-only references, so rows can be built independently.
#[derive(Debug, Clone)]
pub struct FeatureBuilder<'a> {
    surface: &'a FittedSurface,
    danger_zones: &'a [Location],
    median_job_location: Location,
    reference: &'a CityReference,
}

impl<'a> FeatureBuilder<'a> {
    /// # Errors
    /// `MissingReferenceData` when there are no danger zones or no employers.
    pub fn new(
        surface: &'a FittedSurface,
        danger_zones: &'a [Location],
        employers: &EmployerSet,
        reference: &'a CityReference,
    ) -> Result<Self, ScoringError> {
        if danger_zones.is_empty() {
            return Err(ScoringError::MissingReferenceData("danger zone list is empty"));
        }
        let median_job_location = employers.median_location()?;

        Ok(Self {
            surface,
            danger_zones,
            median_job_location,
            reference,
        })
    }

    pub fn median_job_location(&self) -> Location {
        self.median_job_location
    }

    pub fn build(&self, candidate: &Candidate) -> FeatureRow {
        let location = candidate.coords;

        let zone = self.reference.locator.locate(&location).cloned();
        let green_conc = zone.as_ref().and_then(|z| self.reference.green.get(z));

        match (&zone, green_conc) {
            (None, _) => tracing::debug!("Candidate {} is outside every known zone", candidate.id),
            (Some(z), None) => tracing::debug!("Zone {} of candidate {} has no green value", z, candidate.id),
            _ => {}
        }

        FeatureRow {
            contamination: self.surface.predict(&location),
            distance_to_danger_zone: nearest_distance(&location, self.danger_zones)
                .unwrap_or(f64::INFINITY),
            distance_to_median_job_location: location.distance_to(&self.median_job_location),
            zone,
            green_conc,
            price: f64::from(candidate.price),
        }
    }

    pub fn build_all(&self, candidates: &[Candidate]) -> Vec<FeatureRow> {
        candidates.iter().map(|candidate| self.build(candidate)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::contamination::ContaminationEstimator;
    use crate::core::zones::ZoneLocator;
    use crate::models::{GreenTable, StationReading, ZoneId, ZonePolygon};
    use geo::{LineString, MultiPolygon, Polygon};

    fn reference() -> CityReference {
        let ring = LineString::from(vec![
            (9.10, 45.40),
            (9.30, 45.40),
            (9.30, 45.52),
            (9.10, 45.52),
            (9.10, 45.40),
        ]);
        let zone = ZonePolygon {
            id: ZoneId::new("1"),
            geometry: MultiPolygon::new(vec![Polygon::new(ring, vec![])]),
        };
        CityReference {
            locator: ZoneLocator::new(vec![zone]),
            green: [(ZoneId::new("1"), 0.42)].into_iter().collect::<GreenTable>(),
        }
    }

    fn surface() -> FittedSurface {
        let readings: Vec<StationReading> = (0..16)
            .map(|i| {
                let lt = 45.40 + 0.03 * (i / 4) as f64;
                let lg = 9.10 + 0.05 * (i % 4) as f64;
                StationReading { lt, lg, normv: 10.0 + lt - lg }
            })
            .collect();
        ContaminationEstimator::default().fit(&readings).unwrap()
    }

    fn candidate(id: &str, lat: f64, lon: f64, price: u32) -> Candidate {
        Candidate {
            id: id.to_string(),
            kind: "flat".to_string(),
            address: format!("Via {}", id),
            price,
            coords: Location::new(lat, lon).unwrap(),
        }
    }

    #[test]
    fn test_build_features() {
        let surface = surface();
        let reference = reference();
        let danger = vec![
            Location::new(45.50, 9.16).unwrap(),
            Location::new(45.47, 9.20).unwrap(),
        ];
        let employers = EmployerSet::new(vec![Location::new(45.46, 9.19).unwrap()]);
        let builder = FeatureBuilder::new(&surface, &danger, &employers, &reference).unwrap();

        let home = candidate("a", 45.46, 9.19, 900);
        let row = builder.build(&home);

        assert!(row.distance_to_median_job_location.abs() < 1e-9);
        assert!((row.distance_to_danger_zone - home.coords.distance_to(&danger[1])).abs() < 1e-9);
        assert!((row.contamination - (10.0 + 45.46 - 9.19)).abs() < 1e-6);
        assert_eq!(row.zone, Some(ZoneId::new("1")));
        assert_eq!(row.green_conc, Some(0.42));
        assert_eq!(row.price, 900.0);
    }

    #[test]
    fn test_outside_zone_is_missing_not_zero() {
        let surface = surface();
        let reference = reference();
        let danger = vec![Location::new(45.50, 9.16).unwrap()];
        let employers = EmployerSet::new(vec![Location::new(45.46, 9.19).unwrap()]);
        let builder = FeatureBuilder::new(&surface, &danger, &employers, &reference).unwrap();

        let rows = builder.build_all(&[candidate("out", 45.60, 9.40, 1000)]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].zone, None);
        assert_eq!(rows[0].green_conc, None);
    }

    #[test]
    fn test_requires_reference_data() {
        let surface = surface();
        let reference = reference();
        let employers = EmployerSet::new(vec![Location::new(45.46, 9.19).unwrap()]);

        let err = FeatureBuilder::new(&surface, &[], &employers, &reference).unwrap_err();
        assert!(matches!(err, ScoringError::MissingReferenceData(_)));

        let danger = vec![Location::new(45.50, 9.16).unwrap()];
        let err = FeatureBuilder::new(&surface, &danger, &EmployerSet::default(), &reference)
            .unwrap_err();
        assert!(matches!(err, ScoringError::MissingReferenceData(_)));
    }
}
