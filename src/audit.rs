//! HTTP Audit Middleware
//!
//! Wraps every request in an `http_request` span and writes one completion
//! record per request: correlation id, client IP, method, path, status,
//! latency and, once the [`Session`](crate::auth::Session) extractor has run,
//! the caller's user id.
//!
//! # Security Events Captured
//!
//! - 403 → `SecurityEvent::AccessDenied`
//! - 401 → warning only; login outcomes and rejected sessions are reported
//!   by [`AuthService`](crate::auth::AuthService) itself
//! - 5xx → logged at error level with the correlation id
//!
//! The correlation id is taken from `X-Correlation-ID` or `X-Request-ID`, or
//! generated, and echoed back in the `x-correlation-id` response header. While
//! the request runs it is also available through [`current_correlation_id`],
//! which is how error envelopes carry their `requestId`.

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use std::time::{Duration, Instant};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::observability::SecurityEvent;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

tokio::task_local! {
    static CORRELATION_ID: String;
}

/// Correlation id of the request being handled, if inside the audit middleware.
pub fn current_correlation_id() -> Option<String> {
    CORRELATION_ID.try_with(Clone::clone).ok()
}

/// Use with `axum::middleware::from_fn`.
pub async fn audit_middleware(request: Request, next: Next) -> Response {
    let correlation_id = extract_or_generate_correlation_id(request.headers());
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client_ip = extract_client_ip(request.headers());

    let start = Instant::now();

    let span = tracing::info_span!(
        "http_request",
        correlation_id = %correlation_id,
        method = %method,
        path = %path,
        client_ip = %client_ip,
        user_id = tracing::field::Empty,
    );

    async move {
        let mut response = CORRELATION_ID
            .scope(correlation_id.clone(), next.run(request))
            .await;

        let status = response.status();
        let latency = start.elapsed();

        log_security_event(status, &path, &client_ip, latency);

        info!(
            status = %status.as_u16(),
            outcome = %AuditOutcome::from_status(status),
            latency_ms = %latency.as_millis(),
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&correlation_id) {
            response.headers_mut().insert(CORRELATION_ID_HEADER, value);
        }
        response
    }
    .instrument(span)
    .await
}

/// Attach the authenticated user to the current request span.
pub fn record_user(user_id: &Uuid) {
    tracing::Span::current().record("user_id", tracing::field::display(user_id));
}

/// The event the middleware itself reports for a status, if any.
fn audit_event(status: StatusCode) -> Option<SecurityEvent> {
    (status == StatusCode::FORBIDDEN).then_some(SecurityEvent::AccessDenied)
}

fn log_security_event(status: StatusCode, path: &str, client_ip: &str, latency: Duration) {
    if let Some(event) = audit_event(status) {
        crate::security_event!(event, ip_address = %client_ip, path = %path, "Access denied");
        return;
    }

    if status.is_server_error() {
        error!(
            status = %status.as_u16(),
            ip_address = %client_ip,
            path = %path,
            latency_ms = %latency.as_millis(),
            "Server error occurred"
        );
    } else if status == StatusCode::UNAUTHORIZED {
        warn!(ip_address = %client_ip, path = %path, "Unauthenticated request");
    } else if status.is_client_error() {
        warn!(status = %status.as_u16(), path = %path, "Request rejected");
    }
}

fn extract_or_generate_correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_ID_HEADER)
        .or_else(|| headers.get("x-request-id"))
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(String::from)
        .unwrap_or_else(|| format!("req-{}", Uuid::new_v4().simple()))
}

/// Client IP from proxy headers.
///
/// Checks, in order: `X-Forwarded-For` (first hop), `X-Real-IP`,
/// `CF-Connecting-IP`. Returns "unknown" when none is present.
pub fn extract_client_ip(headers: &HeaderMap) -> String {
    if let Some(first) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
    {
        return first.trim().to_string();
    }

    for name in ["x-real-ip", "cf-connecting-ip"] {
        if let Some(ip) = headers.get(name).and_then(|v| v.to_str().ok()) {
            return ip.to_string();
        }
    }

    "unknown".to_string()
}

/// Outcome of an audited request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    Success,
    /// Client or server failure
    Failure,
    /// 401 or 403
    Denied,
}

impl AuditOutcome {
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Denied,
            s if s.is_client_error() || s.is_server_error() => Self::Failure,
            _ => Self::Success,
        }
    }
}

impl std::fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Denied => write!(f, "denied"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use tower::ServiceExt;

    #[test]
    fn test_audit_outcome() {
        assert_eq!(AuditOutcome::from_status(StatusCode::OK), AuditOutcome::Success);
        assert_eq!(AuditOutcome::from_status(StatusCode::UNAUTHORIZED), AuditOutcome::Denied);
        assert_eq!(AuditOutcome::from_status(StatusCode::FORBIDDEN), AuditOutcome::Denied);
        assert_eq!(AuditOutcome::from_status(StatusCode::NOT_FOUND), AuditOutcome::Failure);
        assert_eq!(AuditOutcome::Denied.to_string(), "denied");
    }

    #[test]
    fn test_only_access_denied_is_reported_here() {
        assert_eq!(audit_event(StatusCode::FORBIDDEN), Some(SecurityEvent::AccessDenied));
        assert_eq!(audit_event(StatusCode::UNAUTHORIZED), None);
        assert_eq!(audit_event(StatusCode::OK), None);
        assert_eq!(audit_event(StatusCode::CREATED), None);
        assert_eq!(audit_event(StatusCode::INTERNAL_SERVER_ERROR), None);
    }

    #[test]
    fn test_extract_client_ip() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers), "unknown");

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(extract_client_ip(&headers), "10.0.0.2");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(extract_client_ip(&headers), "203.0.113.7");
    }

    #[test]
    fn test_correlation_id() {
        let mut headers = HeaderMap::new();
        let generated = extract_or_generate_correlation_id(&headers);
        assert!(generated.starts_with("req-"));
        assert_ne!(generated, extract_or_generate_correlation_id(&headers));

        headers.insert("x-request-id", HeaderValue::from_static("abc-123"));
        assert_eq!(extract_or_generate_correlation_id(&headers), "abc-123");
    }

    #[tokio::test]
    async fn test_middleware_echoes_correlation_id() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn(audit_middleware));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("x-correlation-id", "corr-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CORRELATION_ID_HEADER], "corr-1");
    }

    #[tokio::test]
    async fn test_correlation_id_visible_to_handlers() {
        assert_eq!(current_correlation_id(), None);

        let app = Router::new()
            .route(
                "/",
                get(|| async { current_correlation_id().unwrap_or_default() }),
            )
            .layer(middleware::from_fn(audit_middleware));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("x-request-id", "corr-2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = http_body_util::BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        assert_eq!(&body[..], b"corr-2");
    }
}
