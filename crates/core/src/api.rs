//! JSON bodies exchanged between the server and its clients.
//!
//! Request fields are all optional at the serde level: a missing field is an
//! `InvalidInput` (400) decided by the handler, not a deserializer rejection.

use serde::{Deserialize, Serialize};

use crate::types::{Order, Profile, VerifiedOrder};

// =============================================================================
// Requests
// =============================================================================

/// `POST /orders/expect`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectOrderRequest {
    #[serde(default)]
    pub order_tracking_id: Option<String>,
    /// Calendar date, `YYYY-MM-DD`.
    #[serde(default)]
    pub expected_date: Option<String>,
}

/// `POST /orders/retrieve`
///
/// Which field is read depends on the deployment's retrieval flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveOrderRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_tracking_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
}

/// `POST /orders/collect`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectOrderRequest {
    #[serde(default)]
    pub order_id: Option<String>,
}

/// `POST /admin/securities`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromoteRequest {
    #[serde(default)]
    pub username: Option<String>,
}

/// `DELETE /admin/securities?userId=`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoteQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// `POST /profile`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub room_number: Option<String>,
}

// =============================================================================
// Responses
// =============================================================================

/// Order listings: `GET /orders` and `GET /orders/verified`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdersResponse<T> {
    pub orders: Vec<T>,
}

/// Alias for the owner's own listing.
pub type MyOrdersResponse = OrdersResponse<Order>;

/// Alias for the security desk listing.
pub type VerifiedOrdersResponse = OrdersResponse<VerifiedOrder>;

/// A single order, e.g. after `collect`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order: Order,
}

/// `POST /orders/expect` success.
///
/// `otp` is present only in handover deployments and is never shown again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedOrderResponse {
    pub order: Order,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
}

/// Name and room printed on the retrieval slip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlipProfile {
    pub username: String,
    pub room_number: String,
}

/// `POST /orders/retrieve` success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveResponse {
    pub order: Order,
    pub profile: SlipProfile,
}

/// `GET /admin/securities`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritiesResponse {
    pub securities: Vec<Profile>,
}

/// `POST /admin/securities` success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoteResponse {
    pub message: String,
    pub profile: Profile,
}

/// Plain confirmation, e.g. after a demotion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// `GET /profile` and `POST /profile` success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub profile: Profile,
}

/// Order counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStats {
    pub total: i64,
    pub expected: i64,
    pub verified: i64,
    pub collected: i64,
    pub retrieved: i64,
}

/// Profile counts by role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_users: i64,
    pub total_security: i64,
    pub total_admin: i64,
}

/// `GET /admin/stats`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub stats: OrderStats,
    pub user_stats: UserStats,
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
