use actix_cors::Cors;
use actix_web::{web, App, HttpServer, HttpResponse, middleware, error, http::StatusCode};
use rentscore::config::{Settings, StorageBackend};
use rentscore::core::{ContaminationEstimator, Ranker};
use rentscore::routes::{self, AppState};
use rentscore::services::{ArtifactStore, CityReference, FileArtifactStore, MemoryArtifactStore};
use std::sync::Arc;
use tracing::{info, error};
use tracing_subscriber::EnvFilter;

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

fn startup_error(context: &str, e: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", context, e);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, e))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Load configuration before logging so the configured level applies
    let settings = Settings::load();

    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| {
        settings.as_ref().map_or_else(|_| "info".to_string(), |s| s.logging.level.clone())
    });
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| {
        settings.as_ref().map_or_else(|_| "json".to_string(), |s| s.logging.format.clone())
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)))
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }

    info!("Starting Rentscore ranking service...");

    let settings = settings.map_err(|e| startup_error("Failed to load configuration", e))?;

    info!("Configuration loaded successfully");

    // Reference data is static for the lifetime of the process
    let reference = CityReference::load(&settings.reference.zones_path, &settings.reference.green_path)
        .map_err(|e| startup_error("Failed to load reference data", e))?;

    let store: Arc<dyn ArtifactStore> = match settings.storage.backend {
        StorageBackend::File => {
            let store = FileArtifactStore::new(&settings.storage.artifact_dir)
                .map_err(|e| startup_error("Failed to open artifact directory", e))?;
            info!("Artifact store: {}", store.dir().display());
            Arc::new(store)
        }
        StorageBackend::Memory => {
            info!("Artifact store: in-memory ({} entries)", settings.storage.memory_capacity);
            Arc::new(MemoryArtifactStore::new(settings.storage.memory_capacity))
        }
    };

    let estimator = ContaminationEstimator::new(settings.estimator.min_readings);
    let ranker = Ranker::new(estimator, Arc::new(reference), store);

    info!("Ranker initialized with default weights: {:?}", settings.scoring.weights);

    // Build application state
    let app_state = AppState {
        ranker,
        scoring: Arc::new(settings.scoring.clone()),
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().limit(16 * 1024 * 1024).error_handler(handle_json_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
