//! Request bodies and their content-type negotiation.

use crate::ApiError;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue};
use serde::Serialize;
use std::sync::Arc;

/// A request body for the body-bearing verbs.
///
/// * [`Body::Json`] is serialized and sent as `application/json` unless the caller already set a
///   content type.
/// * [`Body::Text`] is sent as-is with `text/plain;charset=UTF-8`, again unless one was set.
/// * [`Body::Bytes`] passes through untouched; the content type is the caller's business.
/// * [`Body::Form`] is URL-encoded and always sent as `application/x-www-form-urlencoded`.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(serde_json::Value),
    Text(String),
    Bytes(Bytes),
    Form(Vec<(String, String)>),
}

impl Body {
    /// Serializes `value` into a [`Body::Json`].
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ApiError> {
        serde_json::to_value(value)
            .map(Body::Json)
            .map_err(|e| ApiError::Body(Arc::new(e)))
    }

    /// Encodes the body, filling in the content type in `headers` where appropriate.
    pub(crate) fn encode(self, headers: &mut HeaderMap) -> Result<reqwest::Body, ApiError> {
        match self {
            Body::Json(value) => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                let bytes = serde_json::to_vec(&value).map_err(|e| ApiError::Body(Arc::new(e)))?;
                Ok(bytes.into())
            }
            Body::Text(text) => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(
                        CONTENT_TYPE,
                        HeaderValue::from_static("text/plain;charset=UTF-8"),
                    );
                }
                Ok(text.into())
            }
            Body::Bytes(bytes) => Ok(bytes.into()),
            Body::Form(pairs) => {
                headers.insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/x-www-form-urlencoded"),
                );
                let encoded = form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(&pairs)
                    .finish();
                Ok(encoded.into())
            }
        }
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Body::Json(value)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bytes))
    }
}
