// Unit tests for Rentscore

use rentscore::core::{
    contamination::{polynomial_basis, ContaminationEstimator},
    distance::haversine_distance,
    normalizer::normalize,
    scoring::ScoreAggregator,
    zones::ZoneLocator,
};
use rentscore::models::{
    Feature, FeatureVector, Location, ScoreWeights, StationReading, ZoneId, ZonePolygon,
};
use rentscore::ScoringError;
use geo::{LineString, MultiPolygon, Polygon};

fn station_grid(value: impl Fn(f64, f64) -> f64) -> Vec<StationReading> {
    let mut readings = Vec::new();
    for i in 0..4 {
        for j in 0..4 {
            let lt = 45.42 + 0.025 * i as f64;
            let lg = 9.12 + 0.035 * j as f64;
            readings.push(StationReading { lt, lg, normv: value(lt, lg) });
        }
    }
    readings
}

fn full(value: f64) -> FeatureVector {
    FeatureVector {
        contamination: Some(value),
        distance_to_danger_zone: Some(value),
        distance_to_median_job_location: Some(value),
        green_conc: Some(value),
        price: Some(value),
    }
}

#[test]
fn test_haversine_distance_zero() {
    let distance = haversine_distance(45.4640, 9.1900, 45.4640, 9.1900);
    assert!(distance < 0.01);
}

#[test]
fn test_haversine_distance_milan_to_rome() {
    let distance = haversine_distance(45.4640, 9.1900, 41.9028, 12.4964);
    assert!((distance - 477.0).abs() < 5.0, "Expected ~477km, got {}", distance);
}

#[test]
fn test_haversine_symmetric() {
    let pairs = [
        ((45.4640, 9.1900), (45.4850, 9.2040)),
        ((41.9028, 12.4964), (45.4640, 9.1900)),
        ((-33.8688, 151.2093), (51.5074, -0.1278)),
    ];

    for ((lat1, lon1), (lat2, lon2)) in pairs {
        let there = haversine_distance(lat1, lon1, lat2, lon2);
        let back = haversine_distance(lat2, lon2, lat1, lon1);
        assert!((there - back).abs() < 1e-9);
    }
}

#[test]
fn test_basis_has_ten_terms() {
    assert_eq!(polynomial_basis(0.5, -0.5, 3).len(), 10);
}

#[test]
fn test_contamination_prediction_deterministic() {
    let readings = station_grid(|lt, lg| 0.3 + (lt - 45.4) * 2.0 - (lg - 9.1));
    let estimator = ContaminationEstimator::default();
    let probe = Location::new(45.45, 9.17).unwrap();

    let a = estimator.fit(&readings).unwrap();
    let b = estimator.fit(&readings).unwrap();

    assert_eq!(a, b);
    assert_eq!(a.predict(&probe).to_bits(), b.predict(&probe).to_bits());
}

#[test]
fn test_contamination_requires_ten_readings() {
    let readings: Vec<StationReading> = station_grid(|_, _| 1.0).into_iter().take(9).collect();
    let result = ContaminationEstimator::default().fit(&readings);

    assert!(matches!(
        result,
        Err(ScoringError::InsufficientData { required: 10, distinct: 9 })
    ));
}

#[test]
fn test_normalizer_max_is_one() {
    let rows: Vec<FeatureVector> = [0.3, 2.4, 1.1, 0.0]
        .iter()
        .map(|v| full(*v))
        .collect();
    let table = normalize(&rows).unwrap();

    for feature in Feature::ALL {
        let values: Vec<f64> = table.rows.iter().filter_map(|r| r.get(feature)).collect();
        let max = values.iter().cloned().fold(f64::MIN, f64::max);
        assert_eq!(max, 1.0, "max of {} should be exactly 1.0", feature);
        assert!(values.iter().all(|v| *v <= 1.0));
    }
}

#[test]
fn test_normalizer_equal_values() {
    let rows = vec![full(3.0), full(3.0), full(3.0)];
    let table = normalize(&rows).unwrap();
    assert!(table.rows.iter().all(|r| *r == full(1.0)));
}

#[test]
fn test_increasing_weight_keeps_better_candidate_ahead() {
    // Candidate `a` is further from danger than `b`; everything else is equal
    let a = FeatureVector { distance_to_danger_zone: Some(0.9), ..full(0.5) };
    let b = FeatureVector { distance_to_danger_zone: Some(0.4), ..full(0.5) };

    for danger in [0.0, 0.5, 1.0, 5.0, 50.0] {
        let weights = ScoreWeights { danger, ..ScoreWeights::default() };
        let aggregator = ScoreAggregator::new(weights).unwrap();
        let score_a = aggregator.score(&a).score.unwrap();
        let score_b = aggregator.score(&b).score.unwrap();
        assert!(score_a >= score_b, "danger weight {} reordered candidates", danger);
    }
}

#[test]
fn test_zone_locator_inside_and_outside() {
    let ring = LineString::from(vec![
        (9.15, 45.45),
        (9.20, 45.45),
        (9.20, 45.48),
        (9.15, 45.48),
        (9.15, 45.45),
    ]);
    let locator = ZoneLocator::new(vec![ZonePolygon {
        id: ZoneId::new("1"),
        geometry: MultiPolygon::new(vec![Polygon::new(ring, vec![])]),
    }]);

    let inside = Location::new(45.4640, 9.1900).unwrap();
    let far = Location::new(41.9028, 12.4964).unwrap();

    assert_eq!(locator.locate(&inside), Some(&ZoneId::new("1")));
    assert_eq!(locator.locate(&far), None);
}
