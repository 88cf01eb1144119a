use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;

use crate::error::{FetchError, FetchResult};

/// Everything about an outgoing call except its target.
///
/// Bodies are text. `timeout` is handed to the transport as-is; the
/// interception layer never acts on it.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<String>,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the body and mark it as JSON.
    pub fn json<T: serde::Serialize + ?Sized>(mut self, value: &T) -> FetchResult<Self> {
        let body = serde_json::to_string(value)
            .map_err(|e| FetchError::InvalidRequest(format!("JSON body: {e}")))?;
        self.body = Some(body);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add a header from untyped strings, e.g. parsed from the command line.
    pub fn try_header(mut self, name: &str, value: &str) -> FetchResult<Self> {
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|e| FetchError::InvalidRequest(format!("header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|e| FetchError::InvalidRequest(format!("header {name}: {e}")))?;
        self.headers.append(name, value);
        Ok(self)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = RequestOptions::default();
        assert_eq!(options.method, Method::GET);
        assert!(options.headers.is_empty());
        assert!(options.body.is_none());
        assert!(options.timeout.is_none());
    }

    #[test]
    fn test_json_sets_content_type() {
        let options = RequestOptions::post()
            .json(&serde_json::json!({"x": 1}))
            .unwrap();
        assert_eq!(options.body.as_deref(), Some(r#"{"x":1}"#));
        assert_eq!(options.headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_try_header() {
        let options = RequestOptions::get()
            .try_header("X-Trace", " abc ")
            .unwrap();
        assert_eq!(options.headers["x-trace"], "abc");

        assert!(RequestOptions::get().try_header("bad header", "v").is_err());
    }
}
