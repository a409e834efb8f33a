//! Profile route handlers: the second phase of sign-up.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use tracing::instrument;

use parcel_desk_core::api::{ProfileRequest, ProfileResponse};
use parcel_desk_core::{RoomNumber, Username};

use super::json_body;
use crate::db::{NewProfile, ProfileStore};
use crate::error::AppError;
use crate::services::access::Caller;
use crate::state::AppState;

/// The caller's profile.
#[instrument(skip(caller), fields(user_id = %caller.user_id))]
pub async fn show(caller: Caller) -> Result<Json<ProfileResponse>, AppError> {
    caller
        .profile
        .map(|profile| Json(ProfileResponse { profile }))
        .ok_or_else(|| AppError::NotFound("Profile not found".to_owned()))
}

/// Create the caller's profile, or update its username and room number.
/// The role is never changed here.
#[instrument(skip(state, caller, body), fields(user_id = %caller.user_id))]
pub async fn save(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<ProfileRequest>, JsonRejection>,
) -> Result<Json<ProfileResponse>, AppError> {
    let req = json_body(body)?;
    let invalid = |e: parcel_desk_core::FieldError| AppError::InvalidInput(e.to_string());

    let new = NewProfile {
        user_id: caller.user_id,
        username: Username::parse(req.username.as_deref().unwrap_or_default()).map_err(invalid)?,
        room_number: RoomNumber::parse(req.room_number.as_deref().unwrap_or_default())
            .map_err(invalid)?,
    };

    let profile = state.store().save_profile_details(&new).await?;
    tracing::info!("Profile saved");
    Ok(Json(ProfileResponse { profile }))
}
