//! Parcel Desk Core - Shared domain types.
//!
//! This crate provides the types used across all Parcel Desk components:
//! - `server` - JSON API for students, security staff and admins
//! - `client` - API client and the handover pollers
//! - `cli` - Migrations, role bootstrap and terminal watch views
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. The order state machine lives here so that the
//! server and every store implementation agree on which transitions exist.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, roles, order statuses and validated input fields
//! - [`api`] - JSON request/response bodies shared by server and client

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod types;

pub use types::*;
