//! Persistence for profiles and orders.
//!
//! # Database: schema `parcel`
//!
//! ## Tables
//!
//! - `parcel.profile` - One row per identity: username, room number, role
//! - `parcel."order"` - Tracked deliveries and their lifecycle stamps
//!
//! Every state change is a single conditional `UPDATE` whose predicate names
//! both the target row and the status (or role) it must currently have. A
//! write that matches zero rows means "not found or not in the expected
//! state"; callers never read-then-write.
//!
//! # Backends
//!
//! - [`PgStore`] - `PostgreSQL` via sqlx, used in production
//! - [`MemoryStore`] - a mutex-guarded map evaluating the same predicates,
//!   used by tests and `PARCEL_STORE=memory`
//!
//! # Migrations
//!
//! Migrations live in `crates/server/migrations/` and are applied with:
//! ```bash
//! cargo run -p parcel-desk-cli -- migrate
//! ```

pub mod memory;
pub mod orders;
pub mod profiles;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use parcel_desk_core::api::{OrderStats, UserStats};
use parcel_desk_core::{
    Order, OrderId, Profile, Role, RoomNumber, TrackingId, Transition, UserId, Username,
    VerifiedOrder,
};

pub use memory::MemoryStore;

/// Partial unique index guarding one open registration per tracking id.
pub const ACTIVE_TRACKING_INDEX: &str = "order_active_tracking_idx";

/// Partial unique index guarding one open order per one-time code.
pub const ACTIVE_OTP_INDEX: &str = "order_active_otp_idx";

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The owner already has an `expected` order with this tracking id.
    #[error("an active order with this tracking id already exists")]
    DuplicateActiveOrder,

    /// The generated one-time code is already held by another open order.
    #[error("one-time code collides with an active order")]
    OtpCollision,

    /// Any other constraint violation.
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Classify a unique-violation raised by one of the order indexes.
    fn from_insert(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err
            && db_err.is_unique_violation()
        {
            return match db_err.constraint() {
                Some(ACTIVE_TRACKING_INDEX) => Self::DuplicateActiveOrder,
                Some(ACTIVE_OTP_INDEX) => Self::OtpCollision,
                other => Self::Conflict(other.unwrap_or("unique").to_owned()),
            };
        }
        Self::Database(err)
    }
}

/// Which row a conditional transition targets.
///
/// The expected prior status is added by the [`Transition`] itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderSelector {
    /// Any order with this id (security desk).
    Id(OrderId),
    /// The owner's open order with this tracking id.
    OwnedTracking { owner: UserId, tracking: TrackingId },
    /// The owner's open order whose one-time code hashes to this digest.
    OwnedOtp { owner: UserId, otp_digest: String },
}

impl OrderSelector {
    /// Whether `order` (with its stored digest) is the row this selector names.
    #[must_use]
    pub fn matches(&self, order: &Order, otp_digest: Option<&str>) -> bool {
        match self {
            Self::Id(id) => order.id == *id,
            Self::OwnedTracking { owner, tracking } => {
                order.user_id == *owner && order.order_tracking_id == tracking.as_str()
            }
            Self::OwnedOtp { owner, otp_digest: digest } => {
                order.user_id == *owner && otp_digest == Some(digest.as_str())
            }
        }
    }
}

/// Fields for inserting a new order in status `expected`.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub user_id: UserId,
    pub order_tracking_id: TrackingId,
    pub expected_date: NaiveDate,
    /// Hex SHA-256 of the one-time code, handover deployments only.
    pub otp_digest: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Sign-up details for a profile.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub user_id: UserId,
    pub username: Username,
    pub room_number: RoomNumber,
}

/// Order table operations.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new `expected` order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DuplicateActiveOrder` if the owner already has
    /// an `expected` order with the same tracking id, and
    /// `RepositoryError::OtpCollision` if the code digest is taken.
    async fn insert_order(&self, new: &NewOrder) -> Result<Order, RepositoryError>;

    /// All orders owned by `owner`, newest first.
    async fn list_orders_for_owner(&self, owner: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// All `verified` orders joined with their owner's profile, most
    /// recently verified first.
    async fn list_verified_orders(&self) -> Result<Vec<VerifiedOrder>, RepositoryError>;

    /// Apply `transition` to the row named by `selector` if, and only if, it
    /// currently has `transition.requires()` status.
    ///
    /// Returns `Ok(None)` when no row matched.
    async fn transition_order(
        &self,
        selector: &OrderSelector,
        transition: Transition,
        at: DateTime<Utc>,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Order counts by status.
    async fn order_counts(&self) -> Result<OrderStats, RepositoryError>;
}

/// Profile table operations.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Get a profile by user id.
    async fn get_profile(&self, user_id: UserId) -> Result<Option<Profile>, RepositoryError>;

    /// Create the profile with role `user` unless one already exists, and
    /// return whichever row is now stored.
    async fn insert_profile_if_absent(&self, new: &NewProfile)
    -> Result<Profile, RepositoryError>;

    /// Create the profile, or overwrite username and room number of the
    /// existing one. The role is never touched.
    async fn save_profile_details(&self, new: &NewProfile) -> Result<Profile, RepositoryError>;

    /// Profiles whose username equals `username`, at most `limit` rows.
    async fn find_profiles_by_username(
        &self,
        username: &str,
        limit: i64,
    ) -> Result<Vec<Profile>, RepositoryError>;

    /// Profiles holding `role`, newest first.
    async fn list_profiles_by_role(&self, role: Role) -> Result<Vec<Profile>, RepositoryError>;

    /// Set the role to `to` if the profile currently holds `from`.
    ///
    /// Returns `Ok(None)` when no row matched.
    async fn change_role(
        &self,
        user_id: UserId,
        from: Role,
        to: Role,
    ) -> Result<Option<Profile>, RepositoryError>;

    /// Set the role unconditionally. Operator bootstrap only.
    async fn force_role(
        &self,
        user_id: UserId,
        role: Role,
    ) -> Result<Option<Profile>, RepositoryError>;

    /// Profile counts by role.
    async fn role_counts(&self) -> Result<UserStats, RepositoryError>;
}

/// A complete backend.
#[async_trait]
pub trait Store: OrderStore + ProfileStore {
    /// Cheap round trip used by the readiness probe.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// `PostgreSQL`-backed [`Store`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
