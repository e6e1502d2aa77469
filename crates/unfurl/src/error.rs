// ABOUTME: Error types for the unfurl pipeline including ErrorCode enum and UnfurlError struct.
// ABOUTME: Provides categorized errors with convenience constructors and boolean helpers.

use std::fmt;

/// Error codes representing different categories of pipeline failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidUrl,
    Fetch,
    Timeout,
    Extract,
    Probe,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::InvalidUrl => "invalid URL",
            ErrorCode::Fetch => "fetch error",
            ErrorCode::Timeout => "timeout",
            ErrorCode::Extract => "extraction error",
            ErrorCode::Probe => "dimension probe error",
        };
        write!(f, "{}", s)
    }
}

/// The main error type for unfurl operations.
///
/// Errors never cross a per-URL pipeline boundary into a batch result; they
/// degrade to bare-URL records. This type exists for the seams inside the
/// pipeline (fetch, oEmbed, probe) where callers decide how to degrade.
#[derive(Debug, thiserror::Error)]
pub struct UnfurlError {
    pub code: ErrorCode,
    pub url: String,
    pub op: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl fmt::Display for UnfurlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unfurl: {} {}: {}", self.op, self.url, self.code)?;
        if let Some(ref src) = self.source {
            write!(f, ": {}", src)?;
        }
        Ok(())
    }
}

impl UnfurlError {
    /// Create an InvalidUrl error.
    pub fn invalid_url(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code: ErrorCode::InvalidUrl,
            url: url.into(),
            op: op.into(),
            source,
        }
    }

    /// Create a Fetch error.
    pub fn fetch(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code: ErrorCode::Fetch,
            url: url.into(),
            op: op.into(),
            source,
        }
    }

    /// Create a Timeout error.
    pub fn timeout(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code: ErrorCode::Timeout,
            url: url.into(),
            op: op.into(),
            source,
        }
    }

    /// Create an Extract error.
    pub fn extract(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code: ErrorCode::Extract,
            url: url.into(),
            op: op.into(),
            source,
        }
    }

    /// Create a Probe error.
    pub fn probe(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code: ErrorCode::Probe,
            url: url.into(),
            op: op.into(),
            source,
        }
    }

    /// Returns true if this is a Fetch error.
    pub fn is_fetch(&self) -> bool {
        self.code == ErrorCode::Fetch
    }

    /// Returns true if this is a Timeout error.
    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::Timeout
    }

    /// Returns true if this is an InvalidUrl error.
    pub fn is_invalid_url(&self) -> bool {
        self.code == ErrorCode::InvalidUrl
    }

    /// Returns true if this is an Extract error.
    pub fn is_extract(&self) -> bool {
        self.code == ErrorCode::Extract
    }
}
