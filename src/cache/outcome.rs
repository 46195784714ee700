//! Cache keys and the outcomes stored under them.

use std::fmt;

/// Content type used for every outcome the gateway produces itself.
pub const TEXT_PLAIN: &str = "text/plain";

/// `(source url, requested format)`.
///
/// The format is the one the client asked for, not the one sent upstream:
/// `doi` and `ris` are separate slots even though both render as RIS.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub url: String,
    pub format: String,
}

impl CacheKey {
    pub fn new(url: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format: format.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.format, self.url)
    }
}

/// The terminal result of one gateway computation.
///
/// Failures are ordinary values so they can be memoized alongside
/// successes; [`CachedOutcome::is_failure`] lets the cache policy tell them
/// apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedOutcome {
    /// Upstream rendered successfully (or a DOI was extracted from it).
    Rendered {
        status: u16,
        content_type: String,
        body: String,
    },
    /// Either upstream call failed; `message` is the stringified error.
    UpstreamFailure { message: String },
    /// DOI mode found no `DO` tag in the rendered RIS.
    DoiNotFound,
}

impl CachedOutcome {
    pub fn status(&self) -> u16 {
        match self {
            Self::Rendered { status, .. } => *status,
            Self::UpstreamFailure { .. } => 500,
            Self::DoiNotFound => 404,
        }
    }

    pub fn content_type(&self) -> &str {
        match self {
            Self::Rendered { content_type, .. } => content_type,
            Self::UpstreamFailure { .. } | Self::DoiNotFound => TEXT_PLAIN,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            Self::Rendered { body, .. } => body,
            Self::UpstreamFailure { message } => message,
            Self::DoiNotFound => "",
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Rendered { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_triples() {
        let failed = CachedOutcome::UpstreamFailure {
            message: "connection refused".into(),
        };
        assert_eq!(
            (failed.status(), failed.content_type(), failed.body()),
            (500, "text/plain", "connection refused")
        );
        assert!(failed.is_failure());

        let missing = CachedOutcome::DoiNotFound;
        assert_eq!((missing.status(), missing.body()), (404, ""));
        assert!(missing.is_failure());
    }

    #[test]
    fn rendered_triple_is_verbatim() {
        let ok = CachedOutcome::Rendered {
            status: 200,
            content_type: "application/x-bibtex".into(),
            body: "@article{x}".into(),
        };
        assert_eq!(
            (ok.status(), ok.content_type(), ok.body()),
            (200, "application/x-bibtex", "@article{x}")
        );
        assert!(!ok.is_failure());
    }

    #[test]
    fn doi_and_ris_keys_differ() {
        let url = "https://example.com/paper";
        assert_ne!(CacheKey::new(url, "doi"), CacheKey::new(url, "ris"));
        assert_eq!(CacheKey::new(url, "ris").to_string(), "ris / https://example.com/paper");
    }
}
