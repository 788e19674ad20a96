pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;

use axum::{Router, routing::get};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let action_routes = Router::new()
        .route("/", get(routes::action::list).post(routes::action::create))
        .route(
            "/{action_id}",
            get(routes::action::get).put(routes::action::update),
        )
        .route("/{action_id}/audit-log", get(routes::action::audit_log));

    let api = Router::new().nest("/actions", action_routes);

    // Health check
    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .merge(health)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
