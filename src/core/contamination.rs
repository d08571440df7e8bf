//! Air contamination surface
//!
//! Station readings are sparse, so contamination at an arbitrary address is
//! estimated with a low-order polynomial surface over (lat, lon) fitted by
//! ordinary least squares. The fitted surface owns its basis expansion and
//! input standardization; training and prediction cannot disagree on them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::error::ScoringError;
use crate::models::{Location, StationReading};
use crate::services::{ArtifactKey, ArtifactStore};

/// Total degree of the polynomial basis
pub const SURFACE_DEGREE: usize = 3;

/// Relative threshold under which a QR pivot counts as zero
const RANK_TOLERANCE: f64 = 1e-10;

/// Number of monomials of total degree `<= degree` in two variables
#[inline]
pub const fn basis_len(degree: usize) -> usize {
    (degree + 1) * (degree + 2) / 2
}

/// Expand `(x, y)` into all monomials up to `degree`
///
/// Terms are ordered by total degree, then by decreasing power of `x`:
/// `1, x, y, x², xy, y², x³, x²y, xy², y³` for degree 3.
pub fn polynomial_basis(x: f64, y: f64, degree: usize) -> Vec<f64> {
    let mut terms = Vec::with_capacity(basis_len(degree));
    for total in 0..=degree {
        for y_pow in 0..=total {
            let x_pow = total - y_pow;
            terms.push(x.powi(x_pow as i32) * y.powi(y_pow as i32));
        }
    }
    terms
}

/// Affine rescaling of one input axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct AxisScale {
    center: f64,
    spread: f64,
}

impl AxisScale {
    fn from_values(values: &[f64]) -> Self {
        let n = values.len() as f64;
        let center = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - center).powi(2)).sum::<f64>() / n;
        let spread = variance.sqrt();

        Self {
            center,
            spread: if spread > 0.0 { spread } else { 1.0 },
        }
    }

    #[inline]
    fn apply(&self, value: f64) -> f64 {
        (value - self.center) / self.spread
    }
}

/// Trained contamination model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedSurface {
    degree: usize,
    lat_scale: AxisScale,
    lon_scale: AxisScale,
    coefficients: Vec<f64>,
    training_rows: usize,
}

impl FittedSurface {
    /// Estimated contamination at `location`
    pub fn predict(&self, location: &Location) -> f64 {
        self.expand(location)
            .iter()
            .zip(&self.coefficients)
            .map(|(term, coefficient)| term * coefficient)
            .sum()
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn training_rows(&self) -> usize {
        self.training_rows
    }

    /// Whether a deserialized surface still matches its own basis
    pub fn is_consistent(&self) -> bool {
        self.coefficients.len() == basis_len(self.degree)
            && self.coefficients.iter().all(|c| c.is_finite())
            && self.lat_scale.spread.is_finite()
            && self.lon_scale.spread.is_finite()
            && self.lat_scale.spread > 0.0
            && self.lon_scale.spread > 0.0
    }

    fn expand(&self, location: &Location) -> Vec<f64> {
        polynomial_basis(
            self.lat_scale.apply(location.lat()),
            self.lon_scale.apply(location.lon()),
            self.degree,
        )
    }
}

/// Surface obtained through an [`ArtifactStore`]
#[derive(Debug, Clone)]
pub struct CachedSurface {
    pub surface: FittedSurface,
    pub key: String,
    pub from_cache: bool,
}

/// Fits [`FittedSurface`]s from station readings
#[derive(Debug, Clone)]
pub struct ContaminationEstimator {
    degree: usize,
    min_readings: usize,
}

impl ContaminationEstimator {
    /// Create an estimator requiring at least `min_readings` distinct stations
    ///
    /// The requirement never drops below the number of basis terms.
    pub fn new(min_readings: usize) -> Self {
        Self {
            degree: SURFACE_DEGREE,
            min_readings: min_readings.max(basis_len(SURFACE_DEGREE)),
        }
    }

    pub fn min_readings(&self) -> usize {
        self.min_readings
    }

    /// Fit an OLS surface over the cubic basis of each reading's location
    pub fn fit(&self, readings: &[StationReading]) -> Result<FittedSurface, ScoringError> {
        if readings.is_empty() {
            return Err(ScoringError::MissingReferenceData("air-quality station list is empty"));
        }
        validate_readings(readings)?;

        let distinct = distinct_locations(readings);
        if distinct < self.min_readings {
            return Err(ScoringError::InsufficientData {
                required: self.min_readings,
                distinct,
            });
        }

        let lats: Vec<f64> = readings.iter().map(|r| r.lt).collect();
        let lons: Vec<f64> = readings.iter().map(|r| r.lg).collect();
        let lat_scale = AxisScale::from_values(&lats);
        let lon_scale = AxisScale::from_values(&lons);

        let design: Vec<Vec<f64>> = readings
            .iter()
            .map(|r| polynomial_basis(lat_scale.apply(r.lt), lon_scale.apply(r.lg), self.degree))
            .collect();
        let targets: Vec<f64> = readings.iter().map(|r| r.normv).collect();

        let coefficients = solve_least_squares(design, targets, basis_len(self.degree))
            .ok_or(ScoringError::DegenerateFit { degree: self.degree })?;

        tracing::debug!(
            "Fitted degree-{} contamination surface over {} readings ({} distinct locations)",
            self.degree,
            readings.len(),
            distinct
        );

        Ok(FittedSurface {
            degree: self.degree,
            lat_scale,
            lon_scale,
            coefficients,
            training_rows: readings.len(),
        })
    }

    /// Fit, reusing a stored surface trained on the same readings
    ///
    /// Artifacts are keyed by a digest of the training data, so a stored
    /// surface is only reused for identical readings.
    pub fn fit_cached(
        &self,
        readings: &[StationReading],
        store: &dyn ArtifactStore,
    ) -> Result<CachedSurface, ScoringError> {
        let key = ArtifactKey::surface(&self.training_digest(readings));

        match store.load_surface(&key) {
            Ok(Some(surface)) if surface.degree == self.degree => {
                tracing::trace!("Surface cache hit: {}", key);
                return Ok(CachedSurface {
                    surface,
                    key,
                    from_cache: true,
                });
            }
            Ok(Some(_)) => tracing::warn!("Ignoring stored surface {} with mismatched degree", key),
            Ok(None) => tracing::trace!("Surface cache miss: {}", key),
            Err(e) => tracing::warn!("Failed to load stored surface {}, refitting: {}", key, e),
        }

        let surface = self.fit(readings)?;
        if let Err(e) = store.save_surface(&key, &surface) {
            tracing::warn!("Failed to store surface {}, continuing uncached: {}", key, e);
        }

        Ok(CachedSurface {
            surface,
            key,
            from_cache: false,
        })
    }

    /// SHA-256 of the readings, independent of their order
    pub fn training_digest(&self, readings: &[StationReading]) -> String {
        let mut rows: Vec<[u64; 3]> = readings
            .iter()
            .map(|r| [r.lt.to_bits(), r.lg.to_bits(), r.normv.to_bits()])
            .collect();
        rows.sort_unstable();

        let mut hasher = Sha256::new();
        hasher.update((self.degree as u64).to_le_bytes());
        for row in rows {
            for value in row {
                hasher.update(value.to_le_bytes());
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

impl Default for ContaminationEstimator {
    fn default() -> Self {
        Self::new(basis_len(SURFACE_DEGREE))
    }
}

fn validate_readings(readings: &[StationReading]) -> Result<(), ScoringError> {
    for (index, reading) in readings.iter().enumerate() {
        if let Err(e) = Location::new(reading.lt, reading.lg) {
            return Err(ScoringError::InvalidReading {
                index,
                reason: e.to_string(),
            });
        }
        if !reading.normv.is_finite() {
            return Err(ScoringError::InvalidReading {
                index,
                reason: format!("contamination value {} is not finite", reading.normv),
            });
        }
    }
    Ok(())
}

fn distinct_locations(readings: &[StationReading]) -> usize {
    readings
        .iter()
        .map(|r| (r.lt.to_bits(), r.lg.to_bits()))
        .collect::<HashSet<_>>()
        .len()
}

/// Least-squares solution of `a · x ≈ b` via Householder QR
///
/// `a` is row-major with `cols` columns and at least `cols` rows. Returns
/// `None` when `a` is rank deficient.
fn solve_least_squares(mut a: Vec<Vec<f64>>, mut b: Vec<f64>, cols: usize) -> Option<Vec<f64>> {
    let rows = a.len();
    if rows < cols {
        return None;
    }

    let column_norm = |a: &[Vec<f64>], col: usize, from: usize| {
        (from..rows).map(|i| a[i][col].powi(2)).sum::<f64>().sqrt()
    };
    let max_norm = (0..cols)
        .map(|col| column_norm(&a, col, 0))
        .fold(0.0_f64, f64::max);
    let tolerance = RANK_TOLERANCE * max_norm.max(1.0);

    for k in 0..cols {
        let norm = column_norm(&a, k, k);
        if norm <= tolerance {
            return None;
        }

        let alpha = if a[k][k] > 0.0 { -norm } else { norm };
        let mut v: Vec<f64> = (k..rows).map(|i| a[i][k]).collect();
        v[0] -= alpha;
        let v_norm_sq: f64 = v.iter().map(|x| x * x).sum();

        for j in k..cols {
            let dot: f64 = (k..rows).map(|i| v[i - k] * a[i][j]).sum();
            let factor = 2.0 * dot / v_norm_sq;
            for i in k..rows {
                a[i][j] -= factor * v[i - k];
            }
        }

        let dot: f64 = (k..rows).map(|i| v[i - k] * b[i]).sum();
        let factor = 2.0 * dot / v_norm_sq;
        for i in k..rows {
            b[i] -= factor * v[i - k];
        }
    }

    // Back substitution on the upper-triangular R
    let mut x = vec![0.0; cols];
    for k in (0..cols).rev() {
        if a[k][k].abs() <= tolerance {
            return None;
        }
        let tail: f64 = ((k + 1)..cols).map(|j| a[k][j] * x[j]).sum();
        x[k] = (b[k] - tail) / a[k][k];
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::RankingRun;
    use crate::services::{FileArtifactStore, MemoryArtifactStore, StoreError};

    fn cubic(lat: f64, lon: f64) -> f64 {
        let x = lat - 45.46;
        let y = lon - 9.19;
        2.0 + 3.0 * x - 7.0 * y + 40.0 * x * y + 100.0 * y.powi(3) - 60.0 * x.powi(2) * y
    }

    fn grid_readings() -> Vec<StationReading> {
        let mut readings = Vec::new();
        for i in 0..5 {
            for j in 0..5 {
                let lt = 45.40 + 0.03 * i as f64;
                let lg = 9.10 + 0.04 * j as f64;
                readings.push(StationReading { lt, lg, normv: cubic(lt, lg) });
            }
        }
        readings
    }

    #[test]
    fn test_basis_order_and_len() {
        assert_eq!(basis_len(3), 10);
        let terms = polynomial_basis(2.0, 3.0, 3);
        assert_eq!(terms, vec![1.0, 2.0, 3.0, 4.0, 6.0, 9.0, 8.0, 12.0, 18.0, 27.0]);
    }

    #[test]
    fn test_fit_recovers_cubic_surface() {
        let estimator = ContaminationEstimator::default();
        let surface = estimator.fit(&grid_readings()).unwrap();

        let probe = Location::new(45.455, 9.215).unwrap();
        let predicted = surface.predict(&probe);
        let expected = cubic(45.455, 9.215);
        assert!((predicted - expected).abs() < 1e-6, "expected {}, got {}", expected, predicted);
        assert!(surface.is_consistent());
    }

    #[test]
    fn test_fit_is_deterministic() {
        let estimator = ContaminationEstimator::default();
        let readings = grid_readings();
        let probe = Location::new(45.47, 9.17).unwrap();

        let first = estimator.fit(&readings).unwrap().predict(&probe);
        let second = estimator.fit(&readings).unwrap().predict(&probe);
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn test_insufficient_distinct_readings() {
        let estimator = ContaminationEstimator::default();
        // Twelve readings but only three distinct stations
        let readings: Vec<StationReading> = (0..12)
            .map(|i| StationReading {
                lt: 45.40 + 0.01 * (i % 3) as f64,
                lg: 9.19,
                normv: i as f64,
            })
            .collect();

        match estimator.fit(&readings) {
            Err(ScoringError::InsufficientData { required, distinct }) => {
                assert_eq!(required, 10);
                assert_eq!(distinct, 3);
            }
            other => panic!("expected InsufficientData, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_station_list() {
        assert!(matches!(
            ContaminationEstimator::default().fit(&[]),
            Err(ScoringError::MissingReferenceData(_))
        ));
    }

    #[test]
    fn test_collinear_stations_are_degenerate() {
        let estimator = ContaminationEstimator::default();
        let readings: Vec<StationReading> = (0..12)
            .map(|i| StationReading {
                lt: 45.46,
                lg: 9.10 + 0.01 * i as f64,
                normv: 1.0 + i as f64,
            })
            .collect();

        assert!(matches!(
            estimator.fit(&readings),
            Err(ScoringError::DegenerateFit { degree: 3 })
        ));
    }

    #[test]
    fn test_invalid_reading_rejected() {
        let mut readings = grid_readings();
        readings[4].normv = f64::INFINITY;
        assert!(matches!(
            ContaminationEstimator::default().fit(&readings),
            Err(ScoringError::InvalidReading { index: 4, .. })
        ));
    }

    #[test]
    fn test_min_readings_floor() {
        assert_eq!(ContaminationEstimator::new(3).min_readings(), 10);
        assert_eq!(ContaminationEstimator::new(15).min_readings(), 15);
    }

    #[test]
    fn test_digest_ignores_order() {
        let estimator = ContaminationEstimator::default();
        let readings = grid_readings();
        let mut reversed = readings.clone();
        reversed.reverse();
        assert_eq!(estimator.training_digest(&readings), estimator.training_digest(&reversed));

        let mut changed = readings.clone();
        changed[0].normv += 0.5;
        assert_ne!(estimator.training_digest(&readings), estimator.training_digest(&changed));
    }

    #[test]
    fn test_fit_cached_reuses_surface() {
        let estimator = ContaminationEstimator::default();
        let store = MemoryArtifactStore::new(4);
        let readings = grid_readings();

        let first = estimator.fit_cached(&readings, &store).unwrap();
        assert!(!first.from_cache);

        let second = estimator.fit_cached(&readings, &store).unwrap();
        assert!(second.from_cache);
        assert_eq!(first.key, second.key);
        assert_eq!(first.surface, second.surface);
    }

    struct ReadOnlyStore;

    impl ArtifactStore for ReadOnlyStore {
        fn load_surface(&self, _key: &str) -> Result<Option<FittedSurface>, StoreError> {
            Ok(None)
        }

        fn save_surface(&self, key: &str, _surface: &FittedSurface) -> Result<(), StoreError> {
            Err(StoreError::Corrupt(key.to_string()))
        }

        fn save_ranking(&self, _run: &RankingRun) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn test_fit_cached_survives_failed_save() {
        let cached = ContaminationEstimator::default()
            .fit_cached(&grid_readings(), &ReadOnlyStore)
            .unwrap();
        assert!(!cached.from_cache);
        assert!(cached.surface.is_consistent());
    }

    #[test]
    fn test_fit_cached_refits_corrupt_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path()).unwrap();
        let estimator = ContaminationEstimator::default();
        let readings = grid_readings();
        let key = ArtifactKey::surface(&estimator.training_digest(&readings));

        std::fs::write(dir.path().join(format!("{}.json", key)), "{\"degree\": 3").unwrap();

        let cached = estimator.fit_cached(&readings, &store).unwrap();
        assert!(!cached.from_cache);
        assert_eq!(store.load_surface(&key).unwrap(), Some(cached.surface));
    }
}
