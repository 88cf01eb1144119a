//! Network transports the interception layer can wrap.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use shroud_core::config::TransportConfig;
use tracing::debug;

use crate::error::{FetchError, FetchResult};
use crate::request::RequestOptions;
use crate::response::Response;

/// One request in, one buffered response out.
///
/// Non-2xx statuses are responses, not errors. Retries and cancellation are
/// the transport's business.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, target: &str, options: RequestOptions) -> FetchResult<Response>;
}

/// HTTP(S) transport backed by reqwest with rustls.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: Option<Url>,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> FetchResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: None,
        })
    }

    pub fn from_config(config: &TransportConfig) -> FetchResult<Self> {
        let transport = Self::new(Duration::from_secs(config.timeout_secs))?;
        match &config.base_url {
            Some(base) => transport.with_base_url(base),
            None => Ok(transport),
        }
    }

    /// Resolve relative targets against `base`. A trailing slash is added so
    /// that the last path segment of `base` is kept.
    pub fn with_base_url(mut self, base: &str) -> FetchResult<Self> {
        let mut url = Url::parse(base)
            .map_err(|e| FetchError::InvalidRequest(format!("base URL {base:?}: {e}")))?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        self.base_url = Some(url);
        Ok(self)
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    fn resolve(&self, target: &str) -> FetchResult<Url> {
        if let Ok(url) = Url::parse(target) {
            return Ok(url);
        }
        let base = self.base_url.as_ref().ok_or_else(|| {
            FetchError::InvalidRequest(format!("relative target {target:?} without a base URL"))
        })?;
        base.join(target.trim_start_matches('/'))
            .map_err(|e| FetchError::InvalidRequest(format!("target {target:?}: {e}")))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, target: &str, options: RequestOptions) -> FetchResult<Response> {
        let url = self.resolve(target)?;
        debug!(method = %options.method, %url, "sending request");

        let mut request = self
            .client
            .request(options.method, url)
            .headers(options.headers);
        if let Some(body) = options.body {
            request = request.body(body);
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(Response::new(status, headers, body))
    }
}
