//! Request-id/trace-id propagation.
//!
//! Inbound ids are honored when present, generated otherwise, attached to
//! a span covering the handler, and echoed back on the response.

use std::time::Instant;

use axum::extract::Request;
use axum::http::header::HeaderName;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const TRACE_ID_HEADER: &str = "x-trace-id";

pub async fn request_context_middleware(request: Request, next: Next) -> Response {
    let request_id = header_or_generated(request.headers(), REQUEST_ID_HEADER, "req");
    let trace_id = header_or_generated(request.headers(), TRACE_ID_HEADER, "trace");

    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started_at = Instant::now();

    let span = tracing::info_span!(
        "http_request",
        request_id = %request_id,
        trace_id = %trace_id,
        method = %method,
        path = %path,
    );

    let mut response = next.run(request).instrument(span.clone()).await;

    echo_header(response.headers_mut(), REQUEST_ID_HEADER, &request_id);
    echo_header(response.headers_mut(), TRACE_ID_HEADER, &trace_id);

    tracing::info!(
        parent: &span,
        status = response.status().as_u16(),
        elapsed_ms = started_at.elapsed().as_millis(),
        "request completed"
    );

    response
}

fn header_or_generated(headers: &HeaderMap, name: &'static str, prefix: &str) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| format!("{prefix}-{}", uuid::Uuid::new_v4().simple()))
}

fn echo_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(header_value) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), header_value);
    }
}
