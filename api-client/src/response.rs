//! The response envelope and body parsing.

use crate::{ApiError, RawResponse};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// A parsed response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseData {
    /// The server declared JSON and sent valid JSON.
    Json(serde_json::Value),
    /// Anything else, as text.
    Text(String),
    /// `204`, or an explicit zero content length. No parsing was attempted.
    NoContent,
}

/// A successful response: body, status, and headers.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub data: ResponseData,
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl ApiResponse {
    /// Deserializes the body into `T`.
    ///
    /// A [`ResponseData::NoContent`] body deserializes from JSON `null`, so `Option<T>` and `()`
    /// work for empty responses. Text bodies are parsed as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let parsed = match &self.data {
            ResponseData::Json(value) => T::deserialize(value),
            ResponseData::Text(text) => serde_json::from_str(text),
            ResponseData::NoContent => T::deserialize(&serde_json::Value::Null),
        };
        parsed.map_err(|e| ApiError::InvalidJson {
            status: self.status,
            source: Arc::new(e),
        })
    }

    /// The body as text, if it was not JSON.
    pub fn text(&self) -> Option<&str> {
        match &self.data {
            ResponseData::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_no_content(&self) -> bool {
        matches!(self.data, ResponseData::NoContent)
    }
}

/// Turns a transport response into either an [`ApiResponse`] or an [`ApiError`].
pub(crate) async fn read_response(response: reqwest::Response) -> Result<ApiResponse, ApiError> {
    let status = response.status();
    let headers = response.headers().clone();

    if !status.is_success() {
        // The status is what callers branch on; a body we failed to read is just empty.
        let body = response.bytes().await.unwrap_or_default();
        return Err(ApiError::Status {
            status,
            raw: Arc::new(RawResponse {
                status,
                headers,
                body,
            }),
        });
    }

    let empty = status == StatusCode::NO_CONTENT
        || headers
            .get(CONTENT_LENGTH)
            .is_some_and(|len| len.as_bytes() == b"0");
    if empty {
        return Ok(ApiResponse {
            data: ResponseData::NoContent,
            status,
            headers,
        });
    }

    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::Transport(Arc::new(e)))?;

    let data = if is_json {
        let value = serde_json::from_slice(&bytes).map_err(|e| ApiError::InvalidJson {
            status,
            source: Arc::new(e),
        })?;
        ResponseData::Json(value)
    } else {
        ResponseData::Text(String::from_utf8_lossy(&bytes).into_owned())
    };

    Ok(ApiResponse {
        data,
        status,
        headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn response(status: u16, content_type: Option<&str>, body: &'static str) -> reqwest::Response {
        let mut builder = http::Response::builder().status(status);
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        reqwest::Response::from(builder.body(body).unwrap())
    }

    #[tokio::test]
    async fn json_content_type_is_parsed() {
        let r = read_response(response(
            200,
            Some("application/json; charset=utf-8"),
            r#"{"ok":true}"#,
        ))
        .await
        .unwrap();
        assert_eq!(r.data, ResponseData::Json(serde_json::json!({"ok": true})));
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Flag {
            ok: bool,
        }
        assert_eq!(r.json::<Flag>().unwrap(), Flag { ok: true });
    }

    #[tokio::test]
    async fn other_content_is_text() {
        let r = read_response(response(200, Some("text/html"), "<p>hi</p>"))
            .await
            .unwrap();
        assert_eq!(r.text(), Some("<p>hi</p>"));
    }

    #[tokio::test]
    async fn no_content_is_not_parsed() {
        let r = read_response(response(204, Some("application/json"), ""))
            .await
            .unwrap();
        assert!(r.is_no_content());
        assert_eq!(r.json::<Option<u32>>().unwrap(), None);

        let r = reqwest::Response::from(
            http::Response::builder()
                .status(200)
                .header(CONTENT_TYPE, "application/json")
                .header(CONTENT_LENGTH, "0")
                .body("")
                .unwrap(),
        );
        assert!(read_response(r).await.unwrap().is_no_content());
    }

    #[tokio::test]
    async fn malformed_json_is_its_own_error() {
        let err = read_response(response(200, Some("application/json"), "{nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidJson { status, .. } if status == StatusCode::OK));
    }

    #[tokio::test]
    async fn non_success_carries_raw_response() {
        let err = read_response(response(403, Some("text/plain"), "quota exceeded"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        let raw = err.raw_response().unwrap();
        assert_eq!(raw.text(), "quota exceeded");
        assert_eq!(
            raw.headers.get(CONTENT_TYPE).unwrap().to_str().unwrap(),
            "text/plain"
        );
    }
}
