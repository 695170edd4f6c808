//! Request ids and trace correlation headers

use axum::{
    extract::{MatchedPath, Request},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use opentelemetry::trace::TraceContextExt;
use std::time::Instant;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use uuid::Uuid;

use crate::request_context::RequestContext;

const REQUEST_ID: &str = "x-request-id";
const TRACE_ID: &str = "x-trace-id";
const CORRELATION_ID: &str = "x-correlation-id";

/// Root span per HTTP request
///
/// Every request gets a fresh id, visible to handlers as [`RequestContext`]
/// and returned as `x-request-id` next to `x-trace-id`. A different id sent
/// by the client comes back as `x-correlation-id`.
#[tracing::instrument(
    name = "http_request",
    skip_all,
    fields(
        http.method = %req.method(),
        http.route = %route(&req),
        otel.kind = "server",
        http.response.status_code = tracing::field::Empty,
        request_id = tracing::field::Empty,
    )
)]
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let span = Span::current();
    let started = Instant::now();
    let client_id = header_text(req.headers(), REQUEST_ID);

    let request_id = Uuid::new_v4().to_string();
    span.record("request_id", request_id.as_str());
    req.extensions_mut().insert(RequestContext {
        request_id: request_id.clone(),
    });

    let mut response = next.run(req).await;

    let status = response.status().as_u16();
    span.record("http.response.status_code", status);
    tracing::info!(
        status,
        duration_ms = started.elapsed().as_millis(),
        "Request completed"
    );

    let headers = response.headers_mut();
    set_header(headers, REQUEST_ID, &request_id);
    set_header(headers, TRACE_ID, &trace_id(&span));
    if let Some(client_id) = client_id.filter(|id| *id != request_id) {
        set_header(headers, CORRELATION_ID, &client_id);
    }
    response
}

/// Route template when matched, else the raw path
fn route(req: &Request) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map_or_else(|| req.uri().path(), MatchedPath::as_str)
        .to_string()
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Values that are not valid header text are dropped
fn set_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

fn trace_id(span: &Span) -> String {
    span.context().span().span_context().trace_id().to_string()
}
