//! Core types for Parcel Desk.
//!
//! This module provides type-safe wrappers for the hostel parcel domain.

pub mod fields;
pub mod id;
pub mod order;
pub mod otp;
pub mod profile;
pub mod role;
pub mod status;

pub use fields::{FieldError, RoomNumber, TrackingId, Username};
pub use id::*;
pub use order::{Order, VerifiedOrder};
pub use otp::{Otp, OtpError};
pub use profile::Profile;
pub use role::Role;
pub use status::*;
