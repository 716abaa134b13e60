//! Error types for the crawl pipeline.
//!
//! Only errors that abort the whole crawl live here. Per-page fetch failures
//! are retried and then recorded in the report; per-image failures are logged
//! and dropped.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::ConfigError;

/// Fatal errors raised before or while setting up the crawl pipeline.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Invalid configuration surfaced after the CLI layer.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The thread's first page could not be fetched.
    #[error("thread unreachable at {url}: {reason}")]
    ThreadUnreachable {
        /// The thread URL that failed.
        url: String,
        /// Why the first fetch failed (transport error or HTTP status).
        reason: String,
    },

    /// The pagination control was present but its last token is not a number.
    #[error("malformed pagination control '{text}': last token is not a page number")]
    MalformedPagination {
        /// The pagination text as found in the page.
        text: String,
    },

    /// Clamping the requested range against the thread's last page left
    /// nothing to crawl.
    #[error("page range {from}-{to} is empty after clamping to the thread's last page")]
    EmptyPageRange {
        /// Effective first page after defaulting.
        from: u32,
        /// Effective last page after clamping.
        to: u32,
    },

    /// The shared HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    Client {
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// A destination directory could not be created.
    #[error("failed to create directory {path}: {source}")]
    Io {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl CrawlError {
    /// Creates a `ThreadUnreachable` error.
    #[must_use]
    pub fn thread_unreachable(url: &str, reason: impl Into<String>) -> Self {
        Self::ThreadUnreachable {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a `MalformedPagination` error.
    #[must_use]
    pub fn malformed_pagination(text: &str) -> Self {
        Self::MalformedPagination {
            text: text.to_string(),
        }
    }

    /// Creates an `Io` error for a directory that could not be created.
    #[must_use]
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
