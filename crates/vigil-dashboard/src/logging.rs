use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use rand::Rng;
use std::fmt::Write;
use std::time::Instant;

/// Generate a 16-character hex trace ID (8 random bytes).
fn generate_trace_id() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    let mut s = String::with_capacity(16);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Request/response logging middleware. Every response carries its trace ID
/// in `X-Trace-Id`.
pub async fn request_logging(req: Request, next: Next) -> Response {
    let trace_id = generate_trace_id();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed = start.elapsed();
    let status = response.status();

    if status.is_server_error() {
        tracing::error!(%trace_id, %method, %path, %status, ?elapsed, "request failed");
    } else {
        tracing::debug!(%trace_id, %method, %path, %status, ?elapsed, "request");
    }

    let mut response = response;
    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert("X-Trace-Id", value);
    }
    response
}
