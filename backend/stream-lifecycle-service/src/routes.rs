//! Route configuration
//!
//! Centralized route setup extracted from main.rs.

use crate::handlers;
use crate::metrics::metrics_handler;
use actix_web::web;

/// Configure all routes for the application
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics_handler)).service(
        web::scope("/api/v1")
            .route("/health", web::get().to(handlers::health_check))
            .service(
                web::scope("/streams")
                    .route("", web::post().to(handlers::create_stream))
                    .route("/health", web::get().to(handlers::all_active_health))
                    .route("/by-key/{key}", web::get().to(handlers::get_stream_by_key))
                    .route("/{id}/start", web::post().to(handlers::start_stream))
                    .route("/{id}/end", web::post().to(handlers::end_stream))
                    .route("/{id}", web::patch().to(handlers::update_stream))
                    .route("/{id}/viewers", web::put().to(handlers::update_viewer_count))
                    .route(
                        "/{id}/key/regenerate",
                        web::post().to(handlers::regenerate_stream_key),
                    )
                    .route("/{id}/health", web::put().to(handlers::update_health))
                    .route("/{id}/health", web::get().to(handlers::get_health)),
            ),
    );
}
