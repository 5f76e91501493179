use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let max_body_size = state.max_body_size;
    Router::new()
        .route("/health", get(handlers::health_get))
        .route("/euc-kr/text", post(handlers::read_text))
        .route("/euc-kr/json", post(handlers::read_json))
        .route("/euc-kr/form", post(handlers::read_pinned_form))
        .route("/form", post(handlers::read_standard_form))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
