//! HTTP API router.
//!
//! Routes are nested under `/api/`. Middleware (outermost first):
//! CORS, access log, bearer token capture.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;

pub fn api_router(ctx: ApiContext) -> Router {
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/conditions", get(endpoints::assessment::conditions))
        .route("/assessment", post(endpoints::assessment::submit))
        .route("/patients/:id/report", get(endpoints::report::patient_report))
        .route(
            "/patients/:id/family-history",
            get(endpoints::family::family_history),
        )
        .route(
            "/patients/:id/related-persons",
            get(endpoints::family::related_persons),
        )
        .route("/chat", post(endpoints::chat::send))
        .with_state(ctx);

    Router::new()
        .nest("/api", api)
        .layer(axum::middleware::from_fn(middleware::auth::capture_token))
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(CorsLayer::permissive())
}
