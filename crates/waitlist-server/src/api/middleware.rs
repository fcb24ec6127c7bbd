//! Request logging middleware.

use super::handlers::forwarded_client_addr;
use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{debug, warn};

/// Log each request with its forwarded client, outcome and latency.
///
/// Rejections are logged at warn; the handler has already logged why.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client = forwarded_client_addr(request.headers()).unwrap_or_else(|| "-".to_string());
    let start = Instant::now();

    let response = next.run(request).await;

    let latency_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    if response.status().is_success() {
        debug!(%method, %path, %client, status, latency_ms, "Handled request");
    } else {
        warn!(%method, %path, %client, status, latency_ms, "Request rejected");
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::StatusCode,
        middleware::from_fn,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_response_passes_through_unchanged() {
        let app = Router::new()
            .route("/ok", get(|| async { "fine" }))
            .route("/teapot", get(|| async { StatusCode::IM_A_TEAPOT }))
            .layer(from_fn(logging_middleware));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/ok")
                    .header("x-forwarded-for", "203.0.113.7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"fine");

        let response = app
            .oneshot(Request::builder().uri("/teapot").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    }
}
