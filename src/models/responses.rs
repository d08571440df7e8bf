use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::pipeline::RankingRun;
use crate::models::domain::{
    ExcludedCandidate, FeatureVector, Location, RankedCandidate, ScoreWeights,
};

/// Response for the rank endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankResponse {
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
    pub total_ranked: usize,
}

impl RankResponse {
    /// Build a response carrying at most `limit` ranked candidates
    pub fn from_run(run: RankingRun, limit: usize) -> Self {
        let total_ranked = run.ranked.len();
        let mut ranked = run.ranked;
        ranked.truncate(limit);

        Self {
            run_id: run.run_id,
            job_name: run.job_name,
            generated_at: run.generated_at,
            weights: run.weights,
            median_job_location: run.median_job_location,
            surface_key: run.surface_key,
            column_maxima: run.column_maxima,
            ranked,
            excluded: run.excluded,
            total_candidates: run.total_candidates,
            filtered_by_price: run.filtered_by_price,
            total_ranked,
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub zones: usize,
    pub green_values: usize,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
