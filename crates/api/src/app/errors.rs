use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use redelivery_engine::EngineError;
use redelivery_users::CsvError;

pub fn publish_error_to_response(err: EngineError) -> axum::response::Response {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "publish_error",
        err.to_string(),
    )
}

pub fn csv_error_to_response(err: CsvError) -> axum::response::Response {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "csv_error", err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
