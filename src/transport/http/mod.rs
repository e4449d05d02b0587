pub mod errors;
pub mod handlers;

use {
    crate::AppState,
    axum::{
        Router,
        extract::DefaultBodyLimit,
        routing::{get, post},
    },
    std::time::Duration,
    tower_http::timeout::TimeoutLayer,
};

/// Payment commands are a few KB at most.
pub const BODY_LIMIT: usize = 64 * 1024;

pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route("/v1/gateways", get(handlers::list_gateways))
        .route(
            "/v1/gateways/{gateway}/payments",
            post(handlers::process_payment),
        )
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}
