use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::domain::{
    Candidate, DangerZone, EmployerSite, MissingFeaturePolicy, ScoreWeights, StationReading,
};

/// Request to rank accommodation candidates
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_rent_range"))]
pub struct RankRequest {
    #[validate(length(min = 1))]
    pub job_name: String,
    #[validate(nested)]
    pub accommodations: Vec<Candidate>,
    #[serde(default)]
    pub employers: Vec<EmployerSite>,
    #[serde(default)]
    pub air_stations: Vec<StationReading>,
    #[serde(default)]
    pub danger_zones: Vec<DangerZone>,
    #[serde(default)]
    pub weights: Option<ScoreWeights>,
    #[serde(default)]
    pub min_rent: Option<u32>,
    #[serde(default)]
    pub max_rent: Option<u32>,
    #[serde(default)]
    pub missing_policy: Option<MissingFeaturePolicy>,
    #[serde(default)]
    #[validate(range(min = 1))]
    pub limit: Option<u32>,
}

fn validate_rent_range(request: &RankRequest) -> Result<(), ValidationError> {
    if let (Some(min), Some(max)) = (request.min_rent, request.max_rent) {
        if min > max {
            return Err(ValidationError::new("min_rent_exceeds_max_rent"));
        }
    }
    Ok(())
}
