//! Admin route handlers: security staff and statistics.
//!
//! Role checks live in [`RoleAdmin`](crate::services::access::RoleAdmin).

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection, rejection::QueryRejection},
};
use tracing::instrument;

use parcel_desk_core::api::{
    DemoteQuery, MessageResponse, PromoteRequest, PromoteResponse, SecuritiesResponse,
    StatsResponse,
};

use super::json_body;
use crate::error::AppError;
use crate::services::access::Caller;
use crate::state::AppState;

/// List security guards, newest first.
#[instrument(skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn list_securities(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<SecuritiesResponse>, AppError> {
    let securities = state.roles().list_security(&caller).await?;
    Ok(Json(SecuritiesResponse { securities }))
}

/// Promote a user to security by username.
#[instrument(skip(state, caller, body), fields(user_id = %caller.user_id))]
pub async fn promote(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<PromoteRequest>, JsonRejection>,
) -> Result<Json<PromoteResponse>, AppError> {
    caller.require(parcel_desk_core::Role::Admin)?;
    let req = json_body(body)?;
    let change = state
        .roles()
        .promote(&caller, req.username.as_deref())
        .await?;

    Ok(Json(PromoteResponse {
        message: change.message,
        profile: change.profile,
    }))
}

/// Demote a security guard back to user.
#[instrument(skip(state, caller, query), fields(user_id = %caller.user_id))]
pub async fn demote(
    State(state): State<AppState>,
    caller: Caller,
    query: Result<Query<DemoteQuery>, QueryRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let query = query.map(|Query(q)| q).unwrap_or_default();
    let change = state
        .roles()
        .demote(&caller, query.user_id.as_deref())
        .await?;

    Ok(Json(MessageResponse {
        message: change.message,
    }))
}

/// Counts by order status and profile role.
#[instrument(skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn stats(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<StatsResponse>, AppError> {
    Ok(Json(state.roles().stats(&caller).await?))
}
