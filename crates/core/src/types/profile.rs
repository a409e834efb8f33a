//! Profile records as seen through the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Role, UserId};

/// Per-identity record holding display name, room and role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    pub username: String,
    pub room_number: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}
