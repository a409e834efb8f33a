//! Role gate and role administration.
//!
//! A request's [`Caller`] is resolved once by the extractor and passed to
//! every service explicitly. Role checks are exact: an admin is not
//! implicitly a security guard.

use thiserror::Error;
use tracing::instrument;

use parcel_desk_core::api::{SlipProfile, StatsResponse};
use parcel_desk_core::{Profile, Role, UserId};

use crate::db::{OrderStore, ProfileStore, RepositoryError, Store};

/// Errors from the role gate and role administration.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Caller has no profile or a different role.
    #[error("Forbidden: {0} role required")]
    Forbidden(Role),

    #[error("{0}")]
    InvalidInput(String),

    /// No profile, or more than one, carries the username.
    #[error("No user found with username \"{0}\"")]
    UserNotFound(String),

    #[error("{username} is already a security guard")]
    AlreadyInRole { username: String, role: Role },

    #[error("Cannot change an admin's role")]
    CannotModifyAdmin,

    #[error("This user is not a security guard")]
    NotSecurity,

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// The authenticated principal behind a request.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: UserId,
    /// Email claim from the token, if any.
    pub email: Option<String>,
    /// `None` until sign-up has completed.
    pub profile: Option<Profile>,
}

impl Caller {
    /// The caller's role, if a profile exists.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.profile.as_ref().map(|p| p.role)
    }

    /// Fail closed unless the caller holds exactly `required`.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::Forbidden` with the same message whether the
    /// profile is missing or holds another role.
    pub fn require(&self, required: Role) -> Result<(), AccessError> {
        if self.role() == Some(required) {
            Ok(())
        } else {
            Err(AccessError::Forbidden(required))
        }
    }

    /// Name and room for the retrieval slip.
    #[must_use]
    pub fn slip(&self) -> SlipProfile {
        self.profile.as_ref().map_or_else(
            || SlipProfile {
                username: self
                    .email
                    .clone()
                    .unwrap_or_else(|| parcel_desk_core::VerifiedOrder::UNKNOWN_STUDENT.to_owned()),
                room_number: parcel_desk_core::VerifiedOrder::UNKNOWN_ROOM.to_owned(),
            },
            |p| SlipProfile {
                username: p.username.clone(),
                room_number: p.room_number.clone(),
            },
        )
    }
}

/// Outcome of a role change.
#[derive(Debug, Clone)]
pub struct RoleChange {
    pub message: String,
    pub profile: Profile,
}

/// Admin-only role and statistics operations.
///
/// Every method checks the caller itself, so a handler cannot forget to.
pub struct RoleAdmin<'a> {
    store: &'a dyn Store,
}

impl<'a> RoleAdmin<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// All security guards, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::Forbidden` unless the caller is an admin.
    #[instrument(skip(self, caller), fields(caller = %caller.user_id))]
    pub async fn list_security(&self, caller: &Caller) -> Result<Vec<Profile>, AccessError> {
        caller.require(Role::Admin)?;
        Ok(self.store.list_profiles_by_role(Role::Security).await?)
    }

    /// Promote the single profile named `username` from user to security.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the username is missing or blank
    /// - `UserNotFound` if zero or several profiles carry the name
    /// - `AlreadyInRole` if the target is already security
    /// - `CannotModifyAdmin` if the target is an admin
    #[instrument(skip(self, caller, username), fields(caller = %caller.user_id))]
    pub async fn promote(
        &self,
        caller: &Caller,
        username: Option<&str>,
    ) -> Result<RoleChange, AccessError> {
        caller.require(Role::Admin)?;

        let username = username.map(str::trim).unwrap_or_default();
        if username.is_empty() {
            return Err(AccessError::InvalidInput("Username is required".to_owned()));
        }

        // Two rows are enough to tell "unique" from "ambiguous".
        let mut matches = self.store.find_profiles_by_username(username, 2).await?;
        if matches.len() != 1 {
            tracing::info!(found = matches.len(), "Promotion target not unique");
            return Err(AccessError::UserNotFound(username.to_owned()));
        }
        let target = matches.remove(0);

        match target.role {
            Role::Admin => return Err(AccessError::CannotModifyAdmin),
            Role::Security => {
                return Err(AccessError::AlreadyInRole {
                    username: target.username,
                    role: Role::Security,
                });
            }
            Role::User => {}
        }

        let Some(profile) = self
            .store
            .change_role(target.user_id, Role::User, Role::Security)
            .await?
        else {
            // Role changed between the lookup and the update.
            return Err(self.explain_lost_race(target.user_id, username).await);
        };

        tracing::info!(target_user = %profile.user_id, "Promoted to security");
        Ok(RoleChange {
            message: format!("{} has been promoted to security guard", profile.username),
            profile,
        })
    }

    /// Demote the security guard `user_id` back to user.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the id is missing or not a UUID
    /// - `CannotModifyAdmin` if the target is an admin
    /// - `NotSecurity` if the target does not exist or is not security
    #[instrument(skip(self, caller, user_id), fields(caller = %caller.user_id))]
    pub async fn demote(
        &self,
        caller: &Caller,
        user_id: Option<&str>,
    ) -> Result<RoleChange, AccessError> {
        caller.require(Role::Admin)?;

        let raw = user_id.map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Err(AccessError::InvalidInput("User ID is required".to_owned()));
        }
        let target: UserId = raw
            .parse()
            .map_err(|_| AccessError::InvalidInput("User ID must be a UUID".to_owned()))?;

        if let Some(profile) = self
            .store
            .change_role(target, Role::Security, Role::User)
            .await?
        {
            tracing::info!(target_user = %profile.user_id, "Demoted to user");
            return Ok(RoleChange {
                message: format!("{} has been demoted to regular user", profile.username),
                profile,
            });
        }

        match self.store.get_profile(target).await? {
            Some(p) if p.role == Role::Admin => Err(AccessError::CannotModifyAdmin),
            _ => Err(AccessError::NotSecurity),
        }
    }

    /// Order counts by status and profile counts by role.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::Forbidden` unless the caller is an admin.
    #[instrument(skip(self, caller), fields(caller = %caller.user_id))]
    pub async fn stats(&self, caller: &Caller) -> Result<StatsResponse, AccessError> {
        caller.require(Role::Admin)?;
        let stats = self.store.order_counts().await?;
        let user_stats = self.store.role_counts().await?;
        Ok(StatsResponse { stats, user_stats })
    }

    async fn explain_lost_race(&self, user_id: UserId, username: &str) -> AccessError {
        match self.store.get_profile(user_id).await {
            Ok(Some(p)) if p.role == Role::Admin => AccessError::CannotModifyAdmin,
            Ok(Some(p)) if p.role == Role::Security => AccessError::AlreadyInRole {
                username: p.username,
                role: Role::Security,
            },
            Ok(_) => AccessError::UserNotFound(username.to_owned()),
            Err(e) => e.into(),
        }
    }
}
