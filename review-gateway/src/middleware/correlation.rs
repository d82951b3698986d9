//! Echoes `X-Correlation-ID` on the response, generating one when absent
//! (spec §6), adapted from the teacher's `ensure_request_id`.

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;

const HEADER: &str = "X-Correlation-ID";

pub async fn correlation_id(req: Request<Body>, next: Next) -> Response {
    let incoming = req
        .headers()
        .get(HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string);

    let mut response = next.run(req).await;

    let id = incoming.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_name_is_canonical() {
        assert_eq!(HEADER, "X-Correlation-ID");
    }
}
