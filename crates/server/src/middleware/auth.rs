//! Caller extraction.
//!
//! Every authenticated handler takes a [`Caller`] argument. The extractor
//! verifies the bearer token, loads the caller's profile once, and completes
//! sign-up from the token's `user_metadata` when the profile is missing.
//!
//! # Example
//!
//! ```rust,ignore
//! async fn handler(caller: Caller) -> Result<Json<Value>, AppError> {
//!     caller.require(Role::Security)?;
//!     ...
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::Span;

use parcel_desk_core::{Profile, RoomNumber, Username};

use crate::db::{NewProfile, ProfileStore, RepositoryError, Store};
use crate::error::{AppError, set_sentry_user};
use crate::services::access::Caller;
use crate::services::auth::Claims;
use crate::state::AppState;

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = state.tokens().verify_headers(&parts.headers)?;
        let profile = resolve_profile(state.store(), &claims).await?;

        Span::current().record("user_id", tracing::field::display(claims.sub));
        set_sentry_user(&claims.sub.to_string(), claims.email.as_deref());

        Ok(Self {
            user_id: claims.sub,
            email: claims.email,
            profile,
        })
    }
}

/// Load the caller's profile, creating it from token metadata if absent.
///
/// # Errors
///
/// Returns `RepositoryError` if the store fails.
pub async fn resolve_profile(
    store: &dyn Store,
    claims: &Claims,
) -> Result<Option<Profile>, RepositoryError> {
    if let Some(profile) = store.get_profile(claims.sub).await? {
        return Ok(Some(profile));
    }

    let Some(new) = signup_details(claims) else {
        tracing::debug!(user_id = %claims.sub, "No profile and no usable sign-up metadata");
        return Ok(None);
    };

    let profile = store.insert_profile_if_absent(&new).await?;
    tracing::info!(user_id = %profile.user_id, "Profile reconciled from token metadata");
    Ok(Some(profile))
}

fn signup_details(claims: &Claims) -> Option<NewProfile> {
    let metadata = claims.user_metadata.as_ref()?;
    let username = Username::parse(metadata.username.as_deref()?).ok()?;
    let room_number = RoomNumber::parse(metadata.room_number.as_deref()?).ok()?;
    Some(NewProfile {
        user_id: claims.sub,
        username,
        room_number,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use parcel_desk_core::{Role, UserId};

    use super::*;
    use crate::db::{MemoryStore, ProfileStore};
    use crate::services::auth::UserMetadata;

    fn claims(metadata: Option<(&str, &str)>) -> Claims {
        Claims {
            sub: UserId::generate(),
            exp: i64::MAX,
            aud: "authenticated".to_owned(),
            email: None,
            user_metadata: metadata.map(|(u, r)| UserMetadata {
                username: Some(u.to_owned()),
                room_number: Some(r.to_owned()),
            }),
        }
    }

    #[tokio::test]
    async fn test_reconciles_missing_profile() {
        let store = MemoryStore::new();
        let c = claims(Some(("Jane", "B-204")));

        let profile = resolve_profile(&store, &c).await.unwrap().unwrap();
        assert_eq!(profile.user_id, c.sub);
        assert_eq!(profile.role, Role::User);
        assert!(store.get_profile(c.sub).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_existing_profile_is_not_overwritten() {
        let store = MemoryStore::new();
        let c = claims(Some(("Jane", "B-204")));
        resolve_profile(&store, &c).await.unwrap();
        store.force_role(c.sub, Role::Security).await.unwrap();

        let renamed = Claims {
            user_metadata: Some(UserMetadata {
                username: Some("Someone".to_owned()),
                room_number: Some("Z-1".to_owned()),
            }),
            ..c
        };
        let profile = resolve_profile(&store, &renamed).await.unwrap().unwrap();
        assert_eq!(profile.username, "Jane");
        assert_eq!(profile.role, Role::Security);
    }

    #[tokio::test]
    async fn test_without_metadata_there_is_no_profile() {
        let store = MemoryStore::new();
        assert!(resolve_profile(&store, &claims(None)).await.unwrap().is_none());
        assert!(
            resolve_profile(&store, &claims(Some(("  ", "B-204"))))
                .await
                .unwrap()
                .is_none()
        );
    }
}
