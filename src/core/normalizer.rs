use serde::{Deserialize, Serialize};

use crate::error::ScoringError;
use crate::models::{Feature, FeatureVector};

/// Output of [`normalize`]: scaled rows plus the per-column maxima used
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTable {
    pub rows: Vec<FeatureVector>,
    pub maxima: FeatureVector,
}

/// Max-scale every feature column independently
///
/// `scaled = raw / max(raw)` over the present values of the column. This is
/// not min-max scaling: the smallest value keeps its proportion to the
/// maximum. Missing values stay missing. A column whose maximum is exactly
/// zero scales to zero.
///
/// Needs the complete table; the maxima are unknown until every row is seen.
pub fn normalize(rows: &[FeatureVector]) -> Result<NormalizedTable, ScoringError> {
    let mut scaled = rows.to_vec();
    let mut maxima = FeatureVector::default();

    for feature in Feature::ALL {
        let max = column_max(rows, feature)?;
        maxima.set(feature, max);

        let Some(max) = max else { continue };
        for (row, out) in rows.iter().zip(scaled.iter_mut()) {
            out.set(feature, row.get(feature).map(|raw| scale(raw, max)));
        }
    }

    Ok(NormalizedTable { rows: scaled, maxima })
}

fn column_max(rows: &[FeatureVector], feature: Feature) -> Result<Option<f64>, ScoringError> {
    let mut max: Option<f64> = None;
    for value in rows.iter().filter_map(|row| row.get(feature)) {
        if !value.is_finite() {
            return Err(ScoringError::Normalization {
                feature,
                reason: format!("non-finite value {}", value),
            });
        }
        max = Some(max.map_or(value, |m| m.max(value)));
    }

    if let Some(m) = max {
        if m < 0.0 {
            return Err(ScoringError::Normalization {
                feature,
                reason: format!("column maximum {} is negative", m),
            });
        }
    }

    Ok(max)
}

#[inline]
fn scale(raw: f64, max: f64) -> f64 {
    if max == 0.0 {
        0.0
    } else {
        raw / max
    }
}
