use crate::error::{ErrorReport, ServerError};
use crate::state::ServerState;
use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Request id carried in request extensions
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Response headers set on every response unless a handler already set them
const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "SAMEORIGIN"),
    ("referrer-policy", "no-referrer"),
    ("cross-origin-resource-policy", "same-origin"),
    ("x-dns-prefetch-control", "off"),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
    (
        "content-security-policy",
        "default-src 'none'; frame-ancestors 'none'",
    ),
];

/// API key authentication middleware
///
/// A no-op when no key is configured. Otherwise `x-api-key` must match the
/// configured key exactly.
pub async fn api_key_auth(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    if !state.config.api_key_required() {
        return Ok(next.run(request).await);
    }

    let provided = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let matches: bool = provided
        .as_bytes()
        .ct_eq(state.config.api_key.as_bytes())
        .into();
    if provided.is_empty() || !matches {
        return Err(ServerError::Unauthorized);
    }

    Ok(next.run(request).await)
}

/// Identify the client for rate limiting
///
/// With `trust_proxy` the last `X-Forwarded-For` hop wins (the address the
/// fronting proxy saw); otherwise the socket peer address.
pub fn client_key(request: &Request, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit(',').map(str::trim).find(|hop| !hop.is_empty()));
        if let Some(hop) = forwarded {
            return hop.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Fixed-window rate limiting with draft-7 `RateLimit` headers
pub async fn rate_limit(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let key = client_key(&request, state.config.trust_proxy);
    let decision = state.check_rate_limit(&key);
    let reset_secs = decision.reset_after.as_secs_f64().ceil() as u64;

    if !decision.allowed {
        tracing::warn!(client = %key, limit = decision.limit, "rate limit exceeded");
        return Err(ServerError::RateLimited {
            limit: decision.limit,
            reset_secs,
        });
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&format!("{};w=60", decision.limit)) {
        headers.insert("ratelimit-policy", value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!(
        "limit={}, remaining={}, reset={}",
        decision.limit, decision.remaining, reset_secs
    )) {
        headers.insert("ratelimit", value);
    }
    Ok(response)
}

/// Single place where failed requests are logged and their payload shaped
///
/// Handlers and middleware return [`ServerError`], which leaves an
/// [`ErrorReport`] on the response. Full detail always goes to the log; the
/// client additionally gets `details`, `stack` and `providerStatus` outside
/// production.
pub async fn normalize_errors(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;
    let Some(report) = response.extensions().get::<ErrorReport>().cloned() else {
        return response;
    };

    let stack = report.chain.join("\ncaused by: ");
    if report.status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = report.status.as_u16(),
            name = %report.name,
            message = %report.details,
            stack = %stack,
            "request failed"
        );
    } else {
        tracing::warn!(
            method = %method,
            path = %path,
            status = report.status.as_u16(),
            name = %report.name,
            message = %report.details,
            stack = %stack,
            "request rejected"
        );
    }

    if state.config.is_production() {
        return response;
    }

    let mut body = json!({
        "success": false,
        "error": report.name,
        "message": report.message,
        "details": report.details,
        "stack": stack,
    });
    if let Some(status) = report.provider_status {
        body["providerStatus"] = json!(status);
    }

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(CONTENT_LENGTH);
    parts
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Response::from_parts(parts, Body::from(body.to_string()))
}

/// Security headers on every response
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        let name = HeaderName::from_static(*name);
        if !headers.contains_key(&name) {
            headers.insert(name, HeaderValue::from_static(*value));
        }
    }
    response
}

/// Request ID injection middleware
pub async fn request_id(mut request: Request, next: Next) -> Response {
    // Generate or extract request ID
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

/// Logging middleware
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    tracing::debug!(
        method = %method,
        uri = %uri,
        request_id = %request_id,
        "Request started"
    );

    let response = next.run(request).await;
    let duration = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status,
        duration_ms = %duration.as_millis(),
        request_id = %request_id,
        "Request completed"
    );

    response
}
