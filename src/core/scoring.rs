use crate::error::ScoringError;
use crate::models::{Feature, FeatureVector, ScoreWeights};

/// Whether a larger feature value is better or worse for the tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Benefit,
    Cost,
}

impl Feature {
    pub fn orientation(self) -> Orientation {
        match self {
            Feature::DistanceToDangerZone | Feature::GreenConc => Orientation::Benefit,
            Feature::Contamination | Feature::DistanceToMedianJobLocation | Feature::Price => {
                Orientation::Cost
            }
        }
    }
}

/// Turn a max-scaled value into a reward where higher is always better
///
/// Benefits pass through; costs become `1 - scaled`, so the cheapest, cleanest
/// and closest-to-work candidates earn the most.
#[inline]
pub fn desirability(feature: Feature, scaled: f64) -> f64 {
    match feature.orientation() {
        Orientation::Benefit => scaled,
        Orientation::Cost => 1.0 - scaled,
    }
}

/// Score of one candidate
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    /// `None` when a feature with non-zero weight is missing
    pub score: Option<f64>,
    pub missing: Vec<Feature>,
}

/// Weighted linear combination of scaled features
///
/// Scoring formula:
/// score = (
///     air    * (1 - contamination) +     # Cleaner air = higher
///     danger * distanceToDangerZone +    # Further from danger = higher
///     work   * (1 - distanceToJobs) +    # Closer to employers = higher
///     green  * greenConc +               # Greener zone = higher
///     price  * (1 - price)               # Cheaper = higher
/// )
#[derive(Debug, Clone, Copy)]
pub struct ScoreAggregator {
    weights: ScoreWeights,
}

impl ScoreAggregator {
    pub fn new(weights: ScoreWeights) -> Result<Self, ScoringError> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    pub fn score(&self, scaled: &FeatureVector) -> ScoreBreakdown {
        let missing = scaled.missing();
        let mut total = 0.0;
        let mut complete = true;

        for feature in Feature::ALL {
            let weight = self.weights.weight(feature);
            if weight == 0.0 {
                continue;
            }
            match scaled.get(feature) {
                Some(value) => total += weight * desirability(feature, value),
                None => complete = false,
            }
        }

        ScoreBreakdown {
            score: complete.then_some(total),
            missing,
        }
    }
}
