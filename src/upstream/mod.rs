//! Client for the upstream translation server.
//!
//! The server exposes two endpoints, always called in this order:
//!
//! 1. `POST /web` with `{"url", "sessionid"}` resolves a page into
//!    structured metadata (opaque JSON to us).
//! 2. `POST /export?format=<fmt>` with that metadata renders it as text.
//!
//! Each call is made once. There are no retries and, unless configured, no timeout.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::cache::TEXT_PLAIN;

/// Metadata returned by `/web`. Passed back to `/export` untouched.
pub type Metadata = serde_json::Value;

/// Boxed future returned by [`Upstream`] methods.
pub type UpstreamFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, UpstreamError>> + Send + 'a>>;

/// Which upstream endpoint a call went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Web,
    Export,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Web => "/web",
            Self::Export => "/export",
        })
    }
}

/// A failed upstream call. Only its `Display` form reaches clients.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{endpoint} request failed: {source}")]
    Transport {
        endpoint: Endpoint,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned status {status}: {body}")]
    Status {
        endpoint: Endpoint,
        status: u16,
        body: String,
    },

    #[error("{endpoint} returned malformed JSON: {source}")]
    Decode {
        endpoint: Endpoint,
        #[source]
        source: serde_json::Error,
    },
}

/// Text produced by `/export`, fully buffered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

/// The two-call contract of the translation server.
///
/// Implementations must be shareable across tasks; the gateway holds one
/// behind an `Arc` for the life of the process.
pub trait Upstream: Send + Sync {
    /// Resolves `url` into metadata.
    fn resolve<'a>(&'a self, url: &'a str, session_id: &'a str) -> UpstreamFuture<'a, Metadata>;

    /// Renders `metadata` in `format`.
    fn render<'a>(
        &'a self,
        metadata: &'a Metadata,
        format: &'a str,
    ) -> UpstreamFuture<'a, Rendered>;
}

#[derive(Serialize)]
struct WebRequest<'a> {
    url: &'a str,
    sessionid: &'a str,
}

/// [`Upstream`] over HTTP using `reqwest`.
#[derive(Debug, Clone)]
pub struct TranslationServer {
    client: reqwest::Client,
    base_url: Url,
}

impl TranslationServer {
    /// Creates a client for the server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Client`] if the TLS backend cannot be initialized.
    pub fn new(base_url: Url, timeout: Option<Duration>) -> Result<Self, UpstreamError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(UpstreamError::Client)?;
        Ok(Self { client, base_url })
    }

    fn endpoint_url(&self, endpoint: Endpoint) -> String {
        format!(
            "{}{}",
            self.base_url.as_str().trim_end_matches('/'),
            endpoint
        )
    }

    async fn post_web(&self, url: &str, session_id: &str) -> Result<Metadata, UpstreamError> {
        let endpoint = Endpoint::Web;
        debug!(%url, "resolving via translation server");
        let response = self
            .client
            .post(self.endpoint_url(endpoint))
            .json(&WebRequest {
                url,
                sessionid: session_id,
            })
            .send()
            .await
            .map_err(|source| UpstreamError::Transport { endpoint, source })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| UpstreamError::Transport { endpoint, source })?;

        if !status.is_success() {
            return Err(UpstreamError::Status {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|source| UpstreamError::Decode { endpoint, source })
    }

    async fn post_export(
        &self,
        metadata: &Metadata,
        format: &str,
    ) -> Result<Rendered, UpstreamError> {
        let endpoint = Endpoint::Export;
        debug!(%format, "rendering via translation server");
        let response = self
            .client
            .post(self.endpoint_url(endpoint))
            .query(&[("format", format)])
            .json(metadata)
            .send()
            .await
            .map_err(|source| UpstreamError::Transport { endpoint, source })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(TEXT_PLAIN)
            .to_owned();
        let body = response
            .text()
            .await
            .map_err(|source| UpstreamError::Transport { endpoint, source })?;

        if !status.is_success() {
            return Err(UpstreamError::Status {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }
        Ok(Rendered {
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

impl Upstream for TranslationServer {
    fn resolve<'a>(&'a self, url: &'a str, session_id: &'a str) -> UpstreamFuture<'a, Metadata> {
        Box::pin(self.post_web(url, session_id))
    }

    fn render<'a>(
        &'a self,
        metadata: &'a Metadata,
        format: &'a str,
    ) -> UpstreamFuture<'a, Rendered> {
        Box::pin(self.post_export(metadata, format))
    }
}
