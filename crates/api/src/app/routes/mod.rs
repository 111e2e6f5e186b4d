use axum::{
    Router,
    routing::{get, post},
};

pub mod producer;
pub mod system;

/// Router for the producer endpoints (nested under `/producer-app`).
pub fn router() -> Router {
    Router::new()
        .route("/publish", post(producer::publish))
        .route("/publishNew", post(producer::publish_new))
        .route("/dead-letters", get(producer::dead_letters))
        .route("/stats", get(producer::stats))
}
