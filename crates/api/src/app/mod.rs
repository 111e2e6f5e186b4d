//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: config, publisher, consumer and dead-letter review wiring
//! - `routes/`: HTTP routes + handlers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::middleware;

pub mod errors;
pub mod routes;
pub mod services;

pub use services::{ApiConfig, ProducerServices};

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<ProducerServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/producer-app", routes::router())
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::request_log))
                .layer(Extension(services)),
        )
}
