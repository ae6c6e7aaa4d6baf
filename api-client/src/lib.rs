//! A small JSON-over-HTTP client for internal services.
//!
//! [`ApiClient`] resolves endpoints against a base URL, applies default headers and an optional
//! bearer token, and enforces a hard timeout on every call. Responses come back as an
//! [`ApiResponse`] envelope; anything that isn't a 2xx comes back as an [`ApiError`] you can branch
//! on by status.
//!
//! GETs can optionally be cached for a TTL, and identical GETs that are on the wire at the same time
//! are coalesced into a single network call.

mod body;
mod cache;
mod client;
mod config;
mod endpoint;
mod error;
mod response;
mod transport;

pub use body::Body;
pub use client::{ApiClient, RequestOptions};
pub use config::{
    ApiConfig, AuthConfig, CacheSettings, DEFAULT_CACHE_TTL, DEFAULT_TIMEOUT, StaticToken,
    TokenProvider,
};
pub use endpoint::Endpoint;
pub use error::{ApiError, RawResponse};
pub use response::{ApiResponse, ResponseData};
pub use transport::Transport;

// Re-exported so callers don't need a direct dependency for cancellation.
pub use tokio_util::sync::CancellationToken;
