use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

use crate::config::ScoringSettings;
use crate::core::{Ranker, RankingInputs, RankingOptions};
use crate::error::ScoringError;
use crate::models::{
    DangerZone, EmployerSet, ErrorResponse, HealthResponse, Location, RankRequest, RankResponse,
    ScoreWeights,
};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub ranker: Ranker,
    pub scoring: Arc<ScoringSettings>,
}

/// Configure all ranking routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/rank", web::post().to(rank));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let reference = state.ranker.reference();
    let status = if reference.locator.is_empty() { "degraded" } else { "healthy" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        zones: reference.locator.len(),
        green_values: reference.green.len(),
    })
}

/// Rank accommodations endpoint
///
/// POST /api/v1/rank
///
/// Request body:
/// ```json
/// {
///   "jobName": "data scientist",
///   "accommodations": [{"id": "a1", "type": "flat", "address": "...", "price": 950, "coords": [45.46, 9.19]}],
///   "employers": [{"lt": 45.48, "lg": 9.20}],
///   "airStations": [{"lt": 45.47, "lg": 9.18, "normv": 0.4}],
///   "dangerZones": [{"name": "Corvetto", "lt": 45.44, "lg": 9.22}],
///   "weights": {"price": 1, "work": 1, "danger": 1, "air": 1, "green": 1},
///   "minRent": 800,
///   "maxRent": 1500,
///   "missingPolicy": "exclude",
///   "limit": 20
/// }
/// ```
async fn rank(state: web::Data<AppState>, req: web::Json<RankRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for rank request: field_errors={:?}", errors);
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let req = req.into_inner();
    let scoring = &state.scoring;
    let limit = req
        .limit
        .map_or(scoring.default_limit, |l| l as usize)
        .min(scoring.max_limit);

    let options = RankingOptions {
        weights: req.weights.unwrap_or_else(|| ScoreWeights::from(&scoring.weights)),
        min_rent: req.min_rent.unwrap_or(scoring.min_rent),
        max_rent: req.max_rent.unwrap_or(scoring.max_rent),
        missing_policy: req.missing_policy.unwrap_or(scoring.missing_policy),
    };
    if options.min_rent > options.max_rent {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: format!(
                "minRent {} exceeds maxRent {}",
                options.min_rent, options.max_rent
            ),
            status_code: 400,
        });
    }

    let inputs = match build_inputs(req) {
        Ok(inputs) => inputs,
        Err(e) => return scoring_error_response(&e),
    };

    let ranker = state.ranker.clone();
    let result = web::block(move || ranker.rank(inputs, &options)).await;

    match result {
        Ok(Ok(run)) => HttpResponse::Ok().json(RankResponse::from_run(run, limit)),
        Ok(Err(e)) => scoring_error_response(&e),
        Err(e) => {
            tracing::error!("Ranking task failed: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Ranking failed".to_string(),
                message: e.to_string(),
                status_code: 500,
            })
        }
    }
}

fn build_inputs(req: RankRequest) -> Result<RankingInputs, ScoringError> {
    let employers = EmployerSet::from_sites(&req.employers)?;
    let danger_zones = req
        .danger_zones
        .iter()
        .map(DangerZone::location)
        .collect::<Result<Vec<Location>, _>>()?;

    Ok(RankingInputs {
        job_name: req.job_name,
        candidates: req.accommodations,
        employers,
        stations: req.air_stations,
        danger_zones,
    })
}

fn scoring_error_response(e: &ScoringError) -> HttpResponse {
    if e.is_data_error() {
        tracing::info!("Rejected ranking request: {}", e);
        HttpResponse::UnprocessableEntity().json(ErrorResponse {
            error: "Cannot rank candidates".to_string(),
            message: e.to_string(),
            status_code: 422,
        })
    } else {
        tracing::error!("Ranking failed: {}", e);
        HttpResponse::InternalServerError().json(ErrorResponse {
            error: "Ranking failed".to_string(),
            message: e.to_string(),
            status_code: 500,
        })
    }
}
