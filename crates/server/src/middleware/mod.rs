//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with an empty `request_id` field)
//! 3. Request ID (fills the span field, echoes `x-request-id`)
//! 4. Rate limiting on `/orders/retrieve` only (governor)
//!
//! Authentication is not a layer: handlers take a `Caller` extractor.

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::resolve_profile;
pub use rate_limit::{json_rate_limit_response, retrieve_rate_limiter};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
