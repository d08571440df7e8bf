use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::{
    contamination::ContaminationEstimator,
    features::FeatureBuilder,
    normalizer::normalize,
    scoring::ScoreAggregator,
};
use crate::error::ScoringError;
use crate::models::{
    Candidate, EmployerSet, ExcludedCandidate, FeatureVector, Location, MissingFeaturePolicy,
    RankedCandidate, ScoreWeights, StationReading,
};
use crate::services::{ArtifactStore, CityReference};

/// Raw tables supplied for one ranking run
#[derive(Debug, Clone)]
pub struct RankingInputs {
    pub job_name: String,
    pub candidates: Vec<Candidate>,
    pub employers: EmployerSet,
    pub stations: Vec<StationReading>,
    pub danger_zones: Vec<Location>,
}

/// Caller preferences for one ranking run
#[derive(Debug, Clone, Copy)]
pub struct RankingOptions {
    pub weights: ScoreWeights,
    pub min_rent: u32,
    pub max_rent: u32,
    pub missing_policy: MissingFeaturePolicy,
}

impl Default for RankingOptions {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            min_rent: 800,
            max_rent: 1500,
            missing_policy: MissingFeaturePolicy::default(),
        }
    }
}

/// Result of a ranking run, as persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingRun {
    pub run_id: Uuid,
    pub job_name: String,
    pub generated_at: DateTime<Utc>,
    pub weights: ScoreWeights,
    pub median_job_location: Location,
    pub surface_key: String,
    pub column_maxima: FeatureVector,
    pub ranked: Vec<RankedCandidate>,
    pub excluded: Vec<ExcludedCandidate>,
    pub total_candidates: usize,
    pub filtered_by_price: usize,
}

/// Main ranking orchestrator
///
/// # Pipeline Stages
/// 1. Fit (or reload) the contamination surface
/// 2. Price-range filter
/// 3. Per-candidate raw features
/// 4. Max-scaling over the complete feature table
/// 5. Weighted scoring and ranking
#[derive(Clone)]
pub struct Ranker {
    estimator: ContaminationEstimator,
    reference: Arc<CityReference>,
    store: Arc<dyn ArtifactStore>,
}

impl Ranker {
    pub fn new(
        estimator: ContaminationEstimator,
        reference: Arc<CityReference>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            estimator,
            reference,
            store,
        }
    }

    pub fn reference(&self) -> &CityReference {
        &self.reference
    }

    /// Rank candidates, best first, and persist the run
    pub fn rank(
        &self,
        inputs: RankingInputs,
        options: &RankingOptions,
    ) -> Result<RankingRun, ScoringError> {
        let run_id = Uuid::new_v4();
        let aggregator = ScoreAggregator::new(options.weights)?;

        tracing::info!(
            "Ranking run {} for job '{}': {} candidates, {} employers, {} stations",
            run_id,
            inputs.job_name,
            inputs.candidates.len(),
            inputs.employers.len(),
            inputs.stations.len()
        );

        // Stage 1: global fit, must finish before any prediction
        let cached = self.estimator.fit_cached(&inputs.stations, self.store.as_ref())?;
        let builder = FeatureBuilder::new(
            &cached.surface,
            &inputs.danger_zones,
            &inputs.employers,
            &self.reference,
        )?;

        // Stage 2: price range
        let total_candidates = inputs.candidates.len();
        let candidates: Vec<Candidate> = inputs
            .candidates
            .into_iter()
            .filter(|c| c.price >= options.min_rent && c.price <= options.max_rent)
            .collect();
        let filtered_by_price = total_candidates - candidates.len();

        tracing::debug!(
            "Price filter [{}, {}] kept {} of {} candidates",
            options.min_rent,
            options.max_rent,
            candidates.len(),
            total_candidates
        );

        // Stage 3: raw features
        let rows = builder.build_all(&candidates);

        // Stage 4: collect, then scale
        let vectors: Vec<FeatureVector> = rows.iter().map(|row| row.vector()).collect();
        let table = normalize(&vectors)?;

        // Stage 5: score
        let mut ranked = Vec::with_capacity(candidates.len());
        let mut excluded = Vec::new();

        for ((candidate, features), scaled) in candidates.into_iter().zip(rows).zip(table.rows) {
            let breakdown = aggregator.score(&scaled);

            if breakdown.score.is_none() && options.missing_policy == MissingFeaturePolicy::Exclude {
                tracing::debug!(
                    "Excluding candidate {}: missing {:?}",
                    candidate.id,
                    breakdown.missing
                );
                excluded.push(ExcludedCandidate {
                    id: candidate.id,
                    zone: features.zone,
                    missing_features: breakdown.missing,
                });
                continue;
            }

            ranked.push(RankedCandidate {
                candidate,
                features,
                scaled,
                score: breakdown.score,
                missing_features: breakdown.missing,
            });
        }

        ranked.sort_by(compare_ranked);

        if !excluded.is_empty() {
            tracing::warn!(
                "Run {}: {} candidates excluded for missing zone data",
                run_id,
                excluded.len()
            );
        }

        let run = RankingRun {
            run_id,
            job_name: inputs.job_name,
            generated_at: Utc::now(),
            weights: options.weights,
            median_job_location: builder.median_job_location(),
            surface_key: cached.key,
            column_maxima: table.maxima,
            ranked,
            excluded,
            total_candidates,
            filtered_by_price,
        };

        self.store.save_ranking(&run)?;

        tracing::info!(
            "Run {} ranked {} candidates ({} excluded, {} outside price range)",
            run.run_id,
            run.ranked.len(),
            run.excluded.len(),
            run.filtered_by_price
        );

        Ok(run)
    }
}

/// Score descending with unscored last, then price ascending, then id
fn compare_ranked(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    let by_score = match (a.score, b.score) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    by_score
        .then_with(|| a.candidate.price.cmp(&b.candidate.price))
        .then_with(|| a.candidate.id.cmp(&b.candidate.id))
}
