//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                 - Liveness
//! GET    /health/ready           - Readiness (store round trip)
//!
//! # Orders
//! GET    /orders                 - Caller's own orders
//! POST   /orders/expect          - Register an expected delivery
//! POST   /orders/retrieve        - Owner verifies (handover) or retrieves (single step)
//! GET    /orders/verified        - Security desk queue
//! POST   /orders/collect         - Security hands an order over
//!
//! # Admin
//! GET    /admin/securities       - List security guards
//! POST   /admin/securities       - Promote by username
//! DELETE /admin/securities       - Demote by ?userId=
//! GET    /admin/stats            - Counts by status and role
//!
//! # Profile
//! GET    /profile                - Caller's profile
//! POST   /profile                - Complete or edit sign-up details
//! ```

pub mod admin;
pub mod orders;
pub mod profile;

use axum::{
    Json, Router,
    extract::rejection::JsonRejection,
    middleware::map_response,
    routing::{get, post},
};

use crate::error::AppError;
use crate::middleware::{json_rate_limit_response, retrieve_rate_limiter};
use crate::state::AppState;

/// Unwrap a JSON body, turning any rejection into a 400 with the API's
/// error shape.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected request body");
        AppError::InvalidInput("Request body must be a JSON object".to_owned())
    })
}

/// Create the order routes router.
pub fn order_routes(rate_limited: bool) -> Router<AppState> {
    let retrieve = if rate_limited {
        post(orders::retrieve)
            .layer(retrieve_rate_limiter())
            .layer(map_response(json_rate_limit_response))
    } else {
        post(orders::retrieve)
    };

    Router::new()
        .route("/", get(orders::list_mine))
        .route("/expect", post(orders::expect))
        .route("/retrieve", retrieve)
        .route("/verified", get(orders::list_verified))
        .route("/collect", post(orders::collect))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/securities",
            get(admin::list_securities)
                .post(admin::promote)
                .delete(admin::demote),
        )
        .route("/stats", get(admin::stats))
}

/// Create all API routes.
pub fn routes(rate_limited: bool) -> Router<AppState> {
    Router::new()
        .nest("/orders", order_routes(rate_limited))
        .nest("/admin", admin_routes())
        .route("/profile", get(profile::show).post(profile::save))
}
