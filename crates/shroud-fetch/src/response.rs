use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::{FetchError, FetchResult};

/// A fully-buffered response. Decrypted and passed-through responses have the
/// same shape, so readers cannot tell them apart.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    status_text: String,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: body.into(),
        }
    }

    /// A JSON response with the content type set.
    pub fn from_json<T: serde::Serialize + ?Sized>(
        status: StatusCode,
        value: &T,
    ) -> FetchResult<Self> {
        let body = serde_json::to_vec(value).map_err(|e| FetchError::Body(e.to_string()))?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(Self::new(status, headers, body))
    }

    /// Override the reason phrase, for servers that send a non-canonical one.
    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = status_text.into();
        self
    }

    /// Same status line, new headers and body.
    pub(crate) fn with_body(&self, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status: self.status,
            status_text: self.status_text.clone(),
            headers,
            body: body.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// `application/json` or any `+json` media type, parameters ignored.
    pub fn is_json(&self) -> bool {
        self.content_type().is_some_and(is_json_media_type)
    }

    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Body as text; invalid UTF-8 is replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> FetchResult<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| FetchError::Body(format!("not valid JSON: {e}")))
    }
}

fn is_json_media_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}
