//! DOI extraction from RIS exports.
//!
//! RIS records carry the DOI on a `DO` tag line such as `DO  - 10.1000/xyz`.
//! The tag may sit anywhere in the record, so the whole text is scanned.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Tag anywhere on a line, a dash surrounded by spaces or tabs, then the value
/// up to the line terminator. `\r` is excluded so CRLF exports match cleanly.
static DO_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"DO[ \t]+-[ \t]+([^\r\n]*)")
        .unwrap_or_else(|e| unreachable!("DO tag pattern compiles: {e}"))
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DoiError {
    #[error("no DO tag in RIS output")]
    NotFound,
}

/// Returns the value of the first `DO` tag in `ris`, untrimmed.
///
/// # Examples
///
/// ```
/// use bibgate::doi::{extract_doi, DoiError};
///
/// let ris = "TY  - JOUR\r\nTI  - A paper\r\nDO  - 10.9999/abc\r\nER  - \r\n";
/// assert_eq!(extract_doi(ris), Ok("10.9999/abc"));
/// assert_eq!(extract_doi("TY  - JOUR\n"), Err(DoiError::NotFound));
/// ```
pub fn extract_doi(ris: &str) -> Result<&str, DoiError> {
    DO_TAG
        .captures(ris)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or(DoiError::NotFound)
}
