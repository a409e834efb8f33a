//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Bearer token verification
//! - `access` - Caller role gate and role administration
//! - `lifecycle` - Order creation and state transitions

pub mod access;
pub mod auth;
pub mod lifecycle;
