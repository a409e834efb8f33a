//! Parcel Desk client.
//!
//! - [`ApiClient`] - typed wrapper over the JSON API, authenticated with the
//!   caller's bearer token
//! - [`poller`] - the security desk and student pollers that drive the
//!   handover screens
//!
//! # Example
//!
//! ```rust,ignore
//! let client = Arc::new(ApiClient::new("http://127.0.0.1:3000", token)?);
//! let mut desk = poller::watch_verified(client, poller::SECURITY_POLL_INTERVAL);
//!
//! while let Some(event) = desk.recv().await {
//!     if let VerifiedEvent::Arrivals { .. } = event {
//!         ring_bell();
//!     }
//! }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod client;
pub mod error;
pub mod poller;

pub use client::ApiClient;
pub use error::ClientError;
pub use poller::{OrderFeed, OrderWatchEvent, PollHandle, VerifiedEvent};
