//! Validated free-text fields.
//!
//! Tracking ids, usernames and room numbers are free text typed by humans.
//! They are trimmed and length-checked once at the boundary so the rest of
//! the code never sees padding or empty values.

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a free-text field.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// The input is empty after trimming.
    #[error("{field} is required")]
    Empty {
        /// Human-readable field name.
        field: &'static str,
    },
    /// The input is too long after trimming.
    #[error("{field} must be at most {max} characters")]
    TooLong {
        /// Human-readable field name.
        field: &'static str,
        /// Maximum allowed length.
        max: usize,
    },
}

macro_rules! bounded_text {
    ($(#[$meta:meta])* $name:ident, $label:literal, $max:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Maximum length in characters, after trimming.
            pub const MAX_LENGTH: usize = $max;

            /// Parse from user input, trimming surrounding whitespace.
            ///
            /// # Errors
            ///
            /// Returns an error if the trimmed input is empty or longer
            /// than [`Self::MAX_LENGTH`] characters.
            pub fn parse(s: &str) -> Result<Self, FieldError> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(FieldError::Empty { field: $label });
                }
                if trimmed.chars().count() > Self::MAX_LENGTH {
                    return Err(FieldError::TooLong {
                        field: $label,
                        max: Self::MAX_LENGTH,
                    });
                }
                Ok(Self(trimmed.to_owned()))
            }

            /// Returns the value as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the value and returns its inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

bounded_text!(
    /// Courier tracking / order number as printed on the parcel.
    ///
    /// ```
    /// use parcel_desk_core::TrackingId;
    ///
    /// assert_eq!(TrackingId::parse("  AWB123 ").unwrap().as_str(), "AWB123");
    /// assert!(TrackingId::parse("   ").is_err());
    /// ```
    TrackingId,
    "order tracking ID",
    128
);

bounded_text!(
    /// Display name used by admins to find a profile.
    Username,
    "username",
    64
);

bounded_text!(
    /// Hostel room, e.g. `A-204`.
    RoomNumber,
    "room number",
    32
);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_id_trims() {
        let id = TrackingId::parse("\tAWB123\n").unwrap();
        assert_eq!(id.as_str(), "AWB123");
    }

    #[test]
    fn test_tracking_id_too_long() {
        let err = TrackingId::parse(&"x".repeat(129)).unwrap_err();
        assert_eq!(
            err,
            FieldError::TooLong {
                field: "order tracking ID",
                max: 128
            }
        );
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 32 two-byte characters fit in a room number.
        assert!(RoomNumber::parse(&"é".repeat(32)).is_ok());
        assert!(RoomNumber::parse(&"é".repeat(33)).is_err());
    }

    #[test]
    fn test_empty_username_message() {
        let err = Username::parse("").unwrap_err();
        assert_eq!(err.to_string(), "username is required");
    }
}
