//! Order route handlers.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use tracing::instrument;

use parcel_desk_core::Role;
use parcel_desk_core::api::{
    CollectOrderRequest, CreatedOrderResponse, ExpectOrderRequest, MyOrdersResponse,
    OrderResponse, RetrieveOrderRequest, RetrieveResponse, VerifiedOrdersResponse,
};

use super::json_body;
use crate::error::AppError;
use crate::services::access::Caller;
use crate::state::AppState;

/// List the caller's own orders, newest first.
#[instrument(skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn list_mine(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<MyOrdersResponse>, AppError> {
    let orders = state.lifecycle().list_for_owner(caller.user_id).await?;
    Ok(Json(MyOrdersResponse { orders }))
}

/// Register an expected delivery.
#[instrument(skip(state, caller, body), fields(user_id = %caller.user_id))]
pub async fn expect(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<ExpectOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedOrderResponse>), AppError> {
    let req = json_body(body)?;
    let created = state.lifecycle().create(caller.user_id, &req).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedOrderResponse {
            order: created.order,
            otp: created.otp.map(|otp| otp.expose().to_owned()),
        }),
    ))
}

/// Owner claims an order: verify with the code (handover) or retrieve by
/// tracking id (single step).
#[instrument(skip(state, caller, body), fields(user_id = %caller.user_id))]
pub async fn retrieve(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<RetrieveOrderRequest>, JsonRejection>,
) -> Result<Json<RetrieveResponse>, AppError> {
    let req = json_body(body)?;
    let order = state.lifecycle().retrieve(caller.user_id, &req).await?;

    Ok(Json(RetrieveResponse {
        order,
        profile: caller.slip(),
    }))
}

/// Security desk: orders awaiting handover.
#[instrument(skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn list_verified(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<VerifiedOrdersResponse>, AppError> {
    caller.require(Role::Security)?;
    let orders = state.lifecycle().list_verified().await?;
    Ok(Json(VerifiedOrdersResponse { orders }))
}

/// Security desk: hand a verified order over.
#[instrument(skip(state, caller, body), fields(user_id = %caller.user_id))]
pub async fn collect(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CollectOrderRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, AppError> {
    caller.require(Role::Security)?;
    let req = json_body(body)?;
    let order = state.lifecycle().collect(&req).await?;
    Ok(Json(OrderResponse { order }))
}
