//! Rate-limit-aware Discord REST client
//!
//! Outbound half of the interaction layer:
//! - **Routes** (`route`) - method + path + normalized rate limit bucket key
//! - **Buckets** (`ratelimit`) - per-bucket remaining/reset accounting fed
//!   from response headers
//! - **Errors** (`error`) - the typed HTTP failure taxonomy
//! - **Client** (`client`) - reqwest-backed request loop with the retry
//!   policy: 4xx fail fast, 429 retried once after `retry_after`, 5xx
//!   retried with linearly increasing backoff
//!
//! The interaction engine never talks to this crate directly; the server
//! wires a thin delivery adapter over it so the engine stays testable with
//! in-memory fakes.

pub mod client;
pub mod error;
pub mod ratelimit;
pub mod route;

pub use client::RestClient;
pub use error::{ApiErrorBody, RestError};
pub use ratelimit::BucketTable;
pub use route::Route;
