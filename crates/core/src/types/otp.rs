//! One-time verification code.

use core::fmt;

/// Errors that can occur when parsing an [`Otp`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OtpError {
    /// The input is empty.
    #[error("verification code is required")]
    Empty,
    /// The input is not exactly [`Otp::LENGTH`] ASCII digits.
    #[error("verification code must be {len} digits")]
    Malformed {
        /// Expected number of digits.
        len: usize,
    },
}

/// A six-digit one-time code proving ownership of an order.
///
/// The plaintext is only ever shown to the owner once, at registration;
/// stores keep a digest. `Debug` is redacted so codes never reach logs.
///
/// ```
/// use parcel_desk_core::Otp;
///
/// assert!(Otp::parse(" 042917 ").is_ok());
/// assert!(Otp::parse("42917").is_err());
/// assert!(Otp::parse("04291a").is_err());
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Otp(String);

impl Otp {
    /// Number of digits in a code.
    pub const LENGTH: usize = 6;

    /// Parse a code typed by the owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty or is not exactly
    /// six ASCII digits.
    pub fn parse(s: &str) -> Result<Self, OtpError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(OtpError::Empty);
        }
        if trimmed.len() != Self::LENGTH || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OtpError::Malformed { len: Self::LENGTH });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Build a code from a number below `10^6`, zero-padded.
    ///
    /// Returns `None` if the number has more than six digits.
    #[must_use]
    pub fn from_number(n: u32) -> Option<Self> {
        (n < 1_000_000).then(|| Self(format!("{n:06}")))
    }

    /// Returns the digits.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Otp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Otp([REDACTED])")
    }
}
