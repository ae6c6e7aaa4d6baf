//! Error taxonomy for [`ApiClient`](crate::ApiClient) calls.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::sync::Arc;

/// A non-2xx response as it came off the wire.
///
/// Kept around so callers can branch on the status and still inspect whatever the server said.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    /// The response body decoded lossily as UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Everything that can go wrong with a single [`ApiClient`](crate::ApiClient) call.
///
/// The type is cheaply cloneable so that coalesced requests can hand the same failure to every
/// waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// The configured timeout (or a caller-supplied cancellation) fired before the call finished.
    #[error("request timeout")]
    Timeout,

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}")]
    Status {
        status: StatusCode,
        raw: Arc<RawResponse>,
    },

    /// The response declared a JSON content type but its body did not parse.
    #[error("invalid JSON response (HTTP {status})")]
    InvalidJson {
        status: StatusCode,
        #[source]
        source: Arc<serde_json::Error>,
    },

    /// The request body could not be encoded.
    #[error("encode request body")]
    Body(#[source] Arc<serde_json::Error>),

    /// The endpoint did not resolve to a valid absolute URL.
    #[error("invalid request URL: {url}")]
    InvalidUrl { url: String },

    /// The request never produced a response (connection refused, TLS failure, ...).
    #[error("send request")]
    Transport(#[source] Arc<reqwest::Error>),
}

impl ApiError {
    /// The HTTP status this error is conceptually equivalent to.
    ///
    /// Timeouts report `408`; failures that never reached the server report `500`.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Timeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::Status { status, .. } | ApiError::InvalidJson { status, .. } => *status,
            ApiError::Body(_) | ApiError::InvalidUrl { .. } | ApiError::Transport(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Timeout)
    }

    /// The raw response, if the server produced one.
    pub fn raw_response(&self) -> Option<&RawResponse> {
        match self {
            ApiError::Status { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// A short message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self.status().as_u16() {
            400 => "The request was invalid.".to_string(),
            401 => "You need to sign in.".to_string(),
            403 => "You do not have permission to do that.".to_string(),
            404 => "The requested resource could not be found.".to_string(),
            408 => "The request timed out.".to_string(),
            500 => "The server ran into a problem.".to_string(),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(status: StatusCode, body: &'static str) -> ApiError {
        ApiError::Status {
            status,
            raw: Arc::new(RawResponse {
                status,
                headers: HeaderMap::new(),
                body: Bytes::from_static(body.as_bytes()),
            }),
        }
    }

    #[test]
    fn timeout_reports_408() {
        let err = ApiError::Timeout;
        assert!(err.is_timeout());
        assert_eq!(err.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(err.user_message(), "The request timed out.");
    }

    #[test]
    fn status_error_exposes_raw_response() {
        let err = status_error(StatusCode::NOT_FOUND, "no such thing");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(!err.is_timeout());
        assert_eq!(err.raw_response().map(RawResponse::text).as_deref(), Some("no such thing"));
        assert_eq!(err.to_string(), "HTTP 404 Not Found");
    }

    #[test]
    fn unmapped_status_falls_back_to_display() {
        let err = status_error(StatusCode::TOO_MANY_REQUESTS, "");
        assert_eq!(err.user_message(), "HTTP 429 Too Many Requests");
    }

    #[test]
    fn invalid_url_is_internal() {
        let err = ApiError::InvalidUrl {
            url: "nope".to_string(),
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.raw_response().is_none());
    }
}
