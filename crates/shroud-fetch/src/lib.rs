//! shroud-fetch: transparent end-to-end encryption for HTTP calls
//!
//! [`EncryptedClient`] wraps any [`Transport`]. Outgoing bodies are replaced by
//! `{"encrypted": true, "data": "<base64 envelope>"}`; responses in that form
//! are decrypted and handed back as if the server had sent plaintext.
//!
//! ```no_run
//! # async fn demo() -> shroud_fetch::FetchResult<()> {
//! use std::sync::Arc;
//! use std::time::Duration;
//! use shroud_fetch::{EncryptedClient, ReqwestTransport, RequestOptions};
//! use shroud_keystore::{KeyStore, MemoryStore};
//!
//! let transport = ReqwestTransport::new(Duration::from_secs(30))?
//!     .with_base_url("https://api.example.com")?;
//! let client = EncryptedClient::new(transport, KeyStore::new(Arc::new(MemoryStore::new())))?;
//!
//! let response = client
//!     .call("/transfers", RequestOptions::post().body(r#"{"amount": 100}"#))
//!     .await?;
//! let body: serde_json::Value = response.json()?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod request;
pub mod response;
pub mod transport;

pub use client::EncryptedClient;
pub use error::{FetchError, FetchResult};
pub use request::RequestOptions;
pub use response::Response;
pub use transport::{ReqwestTransport, Transport};

pub use reqwest::{Method, StatusCode};
