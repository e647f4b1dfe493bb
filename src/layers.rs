//! Security layer application for Axum routers
//!
//! Provides the `SecureRouter` trait that wraps any router with the HTTP
//! hardening layers configured in [`SecurityConfig`].

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware;
use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::audit::audit_middleware;
use crate::config::SecurityConfig;

/// Extension trait for applying security layers to an Axum Router.
///
/// ```ignore
/// use axum::{Router, routing::get};
/// use securebiz::{SecurityConfig, SecureRouter};
///
/// let app = Router::new()
///     .route("/", get(handler))
///     .with_security(SecurityConfig::default());
/// ```
pub trait SecureRouter {
    /// Apply every enabled layer. Outermost first:
    /// 1. TraceLayer
    /// 2. Audit middleware
    /// 3. CorsLayer (handles preflight)
    /// 4. Security headers
    /// 5. Request body limit
    /// 6. Timeout (innermost)
    fn with_security(self, config: SecurityConfig) -> Self;
}

impl<S> SecureRouter for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_security(self, config: SecurityConfig) -> Self {
        let mut router = self;

        router = router.layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ));

        router = router.layer(RequestBodyLimitLayer::new(config.max_request_size));

        if config.security_headers_enabled {
            router = router
                .layer(SetResponseHeaderLayer::overriding(
                    header::STRICT_TRANSPORT_SECURITY,
                    HeaderValue::from_static("max-age=31536000; includeSubDomains"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                ))
                // JSON only; nothing should ever be framed or executed
                .layer(SetResponseHeaderLayer::overriding(
                    header::CONTENT_SECURITY_POLICY,
                    HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
                ))
                // responses carry tenant data
                .layer(SetResponseHeaderLayer::overriding(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-store, no-cache, must-revalidate, private"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::REFERRER_POLICY,
                    HeaderValue::from_static("no-referrer"),
                ));
        }

        router = router.layer(build_cors_layer(&config));

        if config.audit_enabled {
            router = router.layer(middleware::from_fn(audit_middleware));
        }

        if config.tracing_enabled {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }
}

/// Session cookies only travel cross-origin to explicitly allowed origins.
fn build_cors_layer(config: &SecurityConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(3600));

    if config.cors_is_restrictive() {
        // same-origin only
        base
    } else if config.cors_is_permissive() {
        // "*" never gets credentials
        base.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|s| HeaderValue::from_str(s).ok())
            .collect();
        base.allow_origin(origins).allow_credentials(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, extract::Request, routing::get, routing::post};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(config: SecurityConfig) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .route("/echo", post(|body: String| async move { body }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .with_security(config)
    }

    #[tokio::test]
    async fn test_security_headers_applied() {
        let response = app(SecurityConfig::default())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let headers = response.headers();
        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert!(headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
        assert!(headers.contains_key(header::CONTENT_SECURITY_POLICY));
    }

    #[tokio::test]
    async fn test_security_headers_can_be_disabled() {
        let config = SecurityConfig::builder().disable_security_headers().build();
        let response = app(config)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(!response.headers().contains_key(header::X_FRAME_OPTIONS));
    }

    #[tokio::test]
    async fn test_body_limit() {
        let config = SecurityConfig::builder().max_request_size(16).build();
        let response = app(config)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/echo")
                    .body(Body::from("x".repeat(64)))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let config = SecurityConfig::builder()
            .request_timeout(Duration::from_millis(50))
            .build();
        let response = app(config)
            .oneshot(Request::builder().uri("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn test_cors_allowlist_allows_credentials() {
        let config = SecurityConfig::builder()
            .cors_origins(vec!["https://app.example.com"])
            .build();
        let response = app(config)
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::ORIGIN, "https://app.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let headers = response.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example.com"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }
}
