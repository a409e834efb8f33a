//! Order records as seen through the API.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{OrderId, OrderStatus, UserId};

/// A tracked delivery owned by one profile.
///
/// Serialized with the same snake_case field names as the stored row.
/// Exactly one of the `*_at` stamps is set per completed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub order_tracking_id: String,
    pub expected_date: NaiveDate,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub collected_at: Option<DateTime<Utc>>,
    pub retrieved_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Whether the owner's wait on this order is over.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// A verified order as shown on the security desk, joined with its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedOrder {
    pub id: OrderId,
    pub order_tracking_id: String,
    pub expected_date: NaiveDate,
    pub verified_at: Option<DateTime<Utc>>,
    pub student_name: String,
    pub room_number: String,
}

impl VerifiedOrder {
    /// Shown when the owner has no profile.
    pub const UNKNOWN_STUDENT: &'static str = "Unknown";
    /// Shown when the owner has no profile.
    pub const UNKNOWN_ROOM: &'static str = "N/A";
}
