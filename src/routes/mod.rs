// Route exports
pub mod rank;

use actix_web::web;

pub use rank::AppState;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(rank::configure),
    );
}
