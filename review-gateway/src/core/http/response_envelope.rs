//! Universal webhook response envelope (spec §6: `{requestId, status,
//! message}` on success, `{error, message}` on failure), adapted from the
//! teacher's `ApiResponse<T>`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct AcceptedBody {
    pub request_id: String,
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

pub fn accepted(request_id: String) -> Response {
    (
        StatusCode::ACCEPTED,
        Json(AcceptedBody { request_id, status: "accepted", message: "review request accepted" }),
    )
        .into_response()
}

pub fn already_processed(request_id: String) -> Response {
    #[derive(Serialize)]
    struct Body {
        request_id: String,
        status: &'static str,
    }
    (StatusCode::OK, Json(Body { request_id, status: "already_processed" })).into_response()
}

pub fn error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: code, message: message.into() })).into_response()
}
