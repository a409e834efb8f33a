//! Parcel Desk server library.
//!
//! The JSON API for hostel parcel tracking, exposed as a library so the
//! router can be driven in-process by tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, extract::State, http::StatusCode, routing::get};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::db::Store;
use crate::state::AppState;

/// Build the full application router, including tracing, request ids and
/// Sentry layers.
pub fn app(state: AppState) -> Router {
    let rate_limited = state.config().rate_limit_enabled;

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes(rate_limited))
        .layer(axum::middleware::from_fn(
            middleware::request_id_middleware,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use parcel_desk_core::RetrievalFlow;
    use secrecy::SecretString;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{AuthConfig, ServerConfig, StoreBackend};
    use crate::db::MemoryStore;
    use crate::middleware::REQUEST_ID_HEADER;
    use crate::middleware::rate_limit::RATE_LIMITED_MESSAGE;

    fn router(rate_limit_enabled: bool) -> Router {
        let config = ServerConfig {
            database_url: None,
            host: Ipv4Addr::LOCALHOST.into(),
            port: 0,
            auth: AuthConfig {
                jwt_secret: SecretString::from("kq8Zr2vLx9Tn4Wb7Yc1Hd6Jf3Mg5Ps0Q"),
                audience: "authenticated".to_owned(),
            },
            retrieval_flow: RetrievalFlow::Handover,
            store: StoreBackend::Memory,
            rate_limit_enabled,
            sentry_dsn: None,
            sentry_environment: None,
        };
        app(AppState::new(config, Arc::new(MemoryStore::new())))
    }

    fn retrieve_from(ip: &str) -> Request<Body> {
        Request::post("/orders/retrieve")
            .header("x-forwarded-for", ip)
            .header("content-type", "application/json")
            .body(Body::from(r#"{"otp":"123456"}"#))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_carries_request_id() {
        let response = router(false)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_retrieve_is_throttled_per_ip() {
        let app = router(true);

        for _ in 0..5 {
            let response = app.clone().oneshot(retrieve_from("203.0.113.7")).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let response = app.clone().oneshot(retrieve_from("203.0.113.7")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], RATE_LIMITED_MESSAGE);

        // Other clients keep their own budget.
        let response = app.oneshot(retrieve_from("198.51.100.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_throttling_can_be_disabled() {
        let app = router(false);
        for _ in 0..10 {
            let response = app.clone().oneshot(retrieve_from("203.0.113.7")).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }
}
