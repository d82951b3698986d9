use axum::http::StatusCode;

pub async fn health_route() -> StatusCode {
    StatusCode::OK
}
