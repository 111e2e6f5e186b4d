use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, info};

use redelivery_users::{User, read_users};

use crate::app::errors::{csv_error_to_response, json_error, publish_error_to_response};
use crate::app::services::ProducerServices;

pub const PUBLISHED: &str = "Message published successfully";

/// Publish one user event and wait for the append.
pub async fn publish(
    Extension(services): Extension<Arc<ProducerServices>>,
    Json(user): Json<User>,
) -> Response {
    match services
        .publisher
        .publish(&services.subject, Some(user.partition_key()), &user)
        .await
    {
        Ok(_) => (StatusCode::OK, PUBLISHED).into_response(),
        Err(err) => publish_error_to_response(err),
    }
}

/// Publish every user from the configured CSV file without waiting for the appends.
///
/// Any request body is ignored.
pub async fn publish_new(Extension(services): Extension<Arc<ProducerServices>>) -> Response {
    let path = services.users_csv.clone();
    let users = match tokio::task::spawn_blocking(move || read_users(path)).await {
        Ok(Ok(users)) => users,
        Ok(Err(err)) => {
            error!(error = %err, "failed to load users csv");
            return csv_error_to_response(err);
        }
        Err(err) => {
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "csv_error", err.to_string());
        }
    };

    info!(count = users.len(), csv = %services.users_csv.display(), "publishing users from csv");
    for user in users {
        let key = user.partition_key();
        // Completion is logged by the publisher; the handle is not awaited.
        drop(services.publisher.send(services.subject.clone(), Some(key), user));
    }

    (StatusCode::OK, PUBLISHED).into_response()
}

/// Users that exhausted their attempts, oldest first.
pub async fn dead_letters(
    Extension(services): Extension<Arc<ProducerServices>>,
) -> impl IntoResponse {
    Json(services.dead_letters.review_list())
}

pub async fn stats(Extension(services): Extension<Arc<ProducerServices>>) -> impl IntoResponse {
    Json(services.stats.snapshot())
}
