//! Capability held by a profile.

use serde::{Deserialize, Serialize};

/// Role stored on every profile.
///
/// Roles are mutually exclusive. New profiles start as [`Role::User`]; only an
/// admin (or the operator bootstrap command) moves a profile between roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "parcel.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Student registering and retrieving their own parcels.
    #[default]
    User,
    /// Desk staff who hand verified parcels over.
    Security,
    /// Manages who holds the security role; sees aggregate counts.
    Admin,
}

impl Role {
    /// All roles, in privilege order.
    pub const ALL: [Self; 3] = [Self::User, Self::Security, Self::Admin];

    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Security => "security",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "security" => Ok(Self::Security),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_role_rejects_unknown() {
        assert!("super_admin".parse::<Role>().is_err());
        assert!("Security".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_defaults_to_user() {
        assert_eq!(Role::default(), Role::User);
    }
}
