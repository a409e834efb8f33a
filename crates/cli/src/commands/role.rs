//! Role bootstrap.
//!
//! ```bash
//! pd-cli role set --username warden --role admin
//! ```
//!
//! The API can only move profiles between `user` and `security`, and only
//! an admin may do that. The first admin is made here.

use parcel_desk_core::{Profile, Role};
use parcel_desk_server::db::{PgStore, ProfileStore, RepositoryError, create_pool};
use thiserror::Error;

/// Errors that can occur while changing a role.
#[derive(Debug, Error)]
pub enum RoleError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connect(#[from] sqlx::Error),

    /// Query failed.
    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    /// No profile has this username.
    #[error("No profile with username: {0}")]
    NotFound(String),

    /// More than one profile has this username.
    #[error("Username {0} is ambiguous ({1} profiles); set the role in SQL by user_id")]
    Ambiguous(String, usize),
}

/// Set the role of the single profile named `username`.
pub async fn set(username: &str, role: Role) -> Result<Profile, RoleError> {
    let database_url =
        super::database_url().ok_or(RoleError::MissingEnvVar("PARCEL_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let store = PgStore::new(create_pool(&database_url).await?);

    let profile = set_role(&store, username, role).await?;
    tracing::info!(
        "Role updated! User: {}, Username: {}, Role: {}",
        profile.user_id,
        profile.username,
        profile.role
    );
    Ok(profile)
}

async fn set_role(
    store: &dyn ProfileStore,
    username: &str,
    role: Role,
) -> Result<Profile, RoleError> {
    let username = username.trim();
    let mut matches = store.find_profiles_by_username(username, 2).await?;

    let target = match matches.len() {
        0 => return Err(RoleError::NotFound(username.to_owned())),
        1 => matches.remove(0),
        n => return Err(RoleError::Ambiguous(username.to_owned(), n)),
    };

    if target.role == role {
        tracing::info!("{} is already {}", target.username, role);
        return Ok(target);
    }

    store
        .force_role(target.user_id, role)
        .await?
        .ok_or_else(|| RoleError::NotFound(username.to_owned()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use parcel_desk_core::{RoomNumber, UserId, Username};
    use parcel_desk_server::db::{MemoryStore, NewProfile};

    use super::*;

    async fn profile(store: &MemoryStore, username: &str) -> Profile {
        store
            .insert_profile_if_absent(&NewProfile {
                user_id: UserId::generate(),
                username: Username::parse(username).unwrap(),
                room_number: RoomNumber::parse("A-1").unwrap(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_bootstraps_admin() {
        let store = MemoryStore::new();
        let warden = profile(&store, "warden").await;

        let updated = set_role(&store, " warden ", Role::Admin).await.unwrap();
        assert_eq!(updated.user_id, warden.user_id);
        assert_eq!(updated.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_unknown_username() {
        let store = MemoryStore::new();
        let err = set_role(&store, "ghost", Role::Admin).await.unwrap_err();
        assert!(matches!(err, RoleError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_ambiguous_username_changes_nothing() {
        let store = MemoryStore::new();
        profile(&store, "sam").await;
        profile(&store, "sam").await;

        let err = set_role(&store, "sam", Role::Security).await.unwrap_err();
        assert!(matches!(err, RoleError::Ambiguous(_, 2)));
        assert!(
            store
                .list_profiles_by_role(Role::Security)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
