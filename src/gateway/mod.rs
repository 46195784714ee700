//! Request orchestration: cache lookup, the two upstream calls, DOI
//! extraction and memoization of the outcome.
//!
//! Every query that gets past validation and misses the cache ends in
//! exactly one cache write, whether it succeeded or failed. Validation
//! failures and cache hits never write.

mod routes;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CachedOutcome, ResultCache, TEXT_PLAIN};
use crate::config::GatewayConfig;
use crate::doi::extract_doi;
use crate::http::{Request, Response, StatusCode};
use crate::upstream::{Upstream, UpstreamError};

pub use routes::router;

/// Format used when the client does not name one.
pub const DEFAULT_FORMAT: &str = "ris";

/// Pseudo-format: render as RIS, answer with the DOI only.
pub const DOI_FORMAT: &str = "doi";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("ERROR: Must specify {name}")]
    MissingParameter { name: &'static str },
}

/// One client query. Empty values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub url: Option<String>,
    pub format: Option<String>,
}

impl Query {
    pub fn new(url: impl Into<String>, format: Option<&str>) -> Self {
        Self {
            url: Some(url.into()),
            format: format.map(str::to_owned),
        }
    }

    /// Reads `url` and `format` from the request's query string.
    pub fn from_request(request: &Request) -> Self {
        Self {
            url: request.query_param("url").map(str::to_owned),
            format: request.query_param("format").map(str::to_owned),
        }
    }

    /// The cache key for this query, or the reason it has none.
    pub fn key(self) -> Result<CacheKey, GatewayError> {
        let url = self
            .url
            .filter(|u| !u.is_empty())
            .ok_or(GatewayError::MissingParameter { name: "url" })?;
        let format = self
            .format
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| DEFAULT_FORMAT.to_owned());
        Ok(CacheKey::new(url, format))
    }
}

/// Where a served outcome came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Cache,
    Upstream,
}

impl Source {
    fn header_value(self) -> &'static str {
        match self {
            Self::Cache => "HIT",
            Self::Upstream => "MISS",
        }
    }
}

type InFlight = Mutex<HashMap<CacheKey, Arc<OnceCell<CachedOutcome>>>>;

/// The caching gateway. Create one at startup and share it behind an `Arc`.
pub struct Gateway {
    upstream: Arc<dyn Upstream>,
    cache: ResultCache,
    session_id: String,
    single_flight: bool,
    missing_param_status: StatusCode,
    in_flight: InFlight,
}

impl Gateway {
    pub fn new(config: &GatewayConfig, upstream: Arc<dyn Upstream>) -> Self {
        Self::with_cache(config, upstream, ResultCache::from_config(&config.cache))
    }

    /// Like [`Gateway::new`] but with a caller-supplied cache.
    pub fn with_cache(
        config: &GatewayConfig,
        upstream: Arc<dyn Upstream>,
        cache: ResultCache,
    ) -> Self {
        Self {
            upstream,
            cache,
            session_id: config.session_id.clone(),
            single_flight: config.single_flight,
            missing_param_status: config.missing_param_status,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Produces the outcome for `query`, from cache or freshly computed.
    pub async fn handle(&self, query: Query) -> Result<CachedOutcome, GatewayError> {
        self.serve(query).await.map(|(outcome, _)| outcome)
    }

    /// Serves an HTTP request to `/`.
    pub async fn respond(&self, request: &Request) -> Response {
        match self.serve(Query::from_request(request)).await {
            Ok((outcome, source)) => Response::new(StatusCode::from_u16(outcome.status()))
                .content_type(outcome.content_type())
                .header("X-Cache", source.header_value())
                .body(outcome.body()),
            Err(e) => {
                warn!(error = %e, "rejecting request");
                Response::new(self.missing_param_status)
                    .content_type(TEXT_PLAIN)
                    .body(e.to_string())
            }
        }
    }

    async fn serve(&self, query: Query) -> Result<(CachedOutcome, Source), GatewayError> {
        let key = query.key()?;

        if let Some(hit) = self.cache.get(&key) {
            info!(key = %key, "in cache");
            return Ok((hit, Source::Cache));
        }

        let outcome = if self.single_flight {
            self.compute_shared(&key).await
        } else {
            self.compute_and_store(&key).await
        };
        Ok((outcome, Source::Upstream))
    }

    /// Joins the computation already running for `key`, or starts it.
    async fn compute_shared(&self, key: &CacheKey) -> CachedOutcome {
        let cell = Arc::clone(
            self.in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(key.clone())
                .or_default(),
        );

        let outcome = cell.get_or_init(|| self.compute_and_store(key)).await.clone();

        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, &cell))
        {
            in_flight.remove(key);
        }
        outcome
    }

    async fn compute_and_store(&self, key: &CacheKey) -> CachedOutcome {
        let outcome = self.compute(key).await.unwrap_or_else(|e| {
            warn!(key = %key, error = %e, "translation failed");
            CachedOutcome::UpstreamFailure {
                message: e.to_string(),
            }
        });
        if !self.cache.put(key.clone(), outcome.clone()) {
            debug!(key = %key, "failure not cached");
        }
        outcome
    }

    async fn compute(&self, key: &CacheKey) -> Result<CachedOutcome, UpstreamError> {
        let doi_mode = key.format == DOI_FORMAT;
        let render_format = if doi_mode {
            DEFAULT_FORMAT
        } else {
            key.format.as_str()
        };

        info!(url = %key.url, format = %key.format, "passing to translation server");
        let metadata = self.upstream.resolve(&key.url, &self.session_id).await?;
        let rendered = self.upstream.render(&metadata, render_format).await?;

        if !doi_mode {
            return Ok(CachedOutcome::Rendered {
                status: rendered.status,
                content_type: rendered.content_type,
                body: rendered.body,
            });
        }

        Ok(match extract_doi(&rendered.body) {
            Ok(doi) => CachedOutcome::Rendered {
                status: rendered.status,
                content_type: TEXT_PLAIN.to_owned(),
                body: doi.to_owned(),
            },
            Err(e) => {
                debug!(url = %key.url, error = %e, "no DOI in RIS export");
                CachedOutcome::DoiNotFound
            }
        })
    }
}
