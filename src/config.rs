//! Crawl configuration and validation.
//!
//! The configuration surface is owned by an external collaborator (the CLI);
//! this module normalizes and validates it before any crawl work starts, so
//! every configuration error is reported up front.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Default number of page/image workers when none is configured.
pub const DEFAULT_WORKERS: usize = 10;

/// Upper bound on the worker count; larger values are clamped.
pub const MAX_WORKERS: usize = 100;

/// Default per-page attempt budget when none is configured.
pub const DEFAULT_RETRIES: u32 = 20;

/// Upper bound on the per-page attempt budget; larger values are clamped.
pub const MAX_RETRIES: u32 = 50;

/// Default destination directory, relative to the working directory.
const DEFAULT_DEST_DIR: &str = "data";

/// Errors raised by configuration validation.
///
/// All of these are fatal and reported before any crawl work starts.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// No thread URL was supplied.
    #[error("URL of the thread to crawl must be specified")]
    MissingThreadUrl,

    /// The thread URL does not parse as an absolute http(s) URL.
    #[error("invalid thread URL '{url}': {reason}")]
    InvalidThreadUrl {
        /// The rejected URL string.
        url: String,
        /// Why the URL was rejected.
        reason: String,
    },

    /// Image crawling was requested without link crawling.
    #[error("images can only be crawled together with links; pass --links as well")]
    MissingCrawlTarget,

    /// The requested page range runs backwards.
    #[error("invalid page range: {from}-{to}")]
    InvalidPageRange {
        /// First page of the requested range.
        from: u32,
        /// Last page of the requested range.
        to: u32,
    },
}

impl ConfigError {
    /// Creates an `InvalidThreadUrl` error.
    #[must_use]
    pub fn invalid_thread_url(url: &str, reason: impl Into<String>) -> Self {
        Self::InvalidThreadUrl {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

/// Effective configuration for one thread crawl.
///
/// The struct serializes into the `config` field of the crawl report, so
/// field names are part of the artifact schema.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlConfig {
    /// URL of the thread's first page.
    pub thread_url: String,
    /// Size of the page fetch pool and of the image download pool.
    pub workers: usize,
    /// Whether hyperlinks are extracted from posts.
    pub crawl_links: bool,
    /// Whether embedded images are extracted and downloaded.
    pub crawl_images: bool,
    /// Directory all artifacts and images are written under.
    #[serde(rename = "destination_path")]
    pub dest_path: PathBuf,
    /// Attempts per page before it is recorded as failed.
    pub retries: u32,
    /// Explicit page numbers to crawl; empty means "use the range".
    pub pages: Vec<u32>,
    /// First page of the range; 0 means "from the beginning".
    pub from_page: u32,
    /// Last page of the range; 0 means "to the thread's last page".
    pub to_page: u32,
}

impl CrawlConfig {
    /// Normalizes defaults and validates the configuration in place.
    ///
    /// Worker and retry counts are clamped into their valid ranges, an empty
    /// destination falls back to `./data`, and zero entries in the explicit
    /// page list are dropped.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the thread URL is missing or not an
    /// absolute http(s) URL, when images are requested without links, or when
    /// the page range runs backwards.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.thread_url.is_empty() {
            return Err(ConfigError::MissingThreadUrl);
        }
        let url = Url::parse(&self.thread_url)
            .map_err(|err| ConfigError::invalid_thread_url(&self.thread_url, err.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid_thread_url(
                &self.thread_url,
                "scheme must be http or https",
            ));
        }
        if url.host_str().is_none() {
            return Err(ConfigError::invalid_thread_url(
                &self.thread_url,
                "URL has no host",
            ));
        }

        if self.workers == 0 {
            self.workers = DEFAULT_WORKERS;
        }
        if self.workers > MAX_WORKERS {
            self.workers = MAX_WORKERS;
        }

        if self.crawl_images && !self.crawl_links {
            return Err(ConfigError::MissingCrawlTarget);
        }

        if self.dest_path.as_os_str().is_empty() {
            self.dest_path = PathBuf::from(DEFAULT_DEST_DIR);
        }

        if self.retries == 0 {
            self.retries = DEFAULT_RETRIES;
        }
        if self.retries > MAX_RETRIES {
            self.retries = MAX_RETRIES;
        }

        self.pages.retain(|&page| page != 0);

        if self.from_page > self.to_page {
            return Err(ConfigError::InvalidPageRange {
                from: self.from_page,
                to: self.to_page,
            });
        }

        Ok(())
    }

    /// Returns the forum's origin (`scheme://host[:port]`) derived from the
    /// thread URL. Relative links in posts resolve against it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidThreadUrl`] when the thread URL does not
    /// parse; cannot happen after a successful [`Self::validate`].
    pub fn forum_origin(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.thread_url)
            .map_err(|err| ConfigError::invalid_thread_url(&self.thread_url, err.to_string()))?;
        let origin = url.origin().ascii_serialization();
        Url::parse(&origin)
            .map_err(|err| ConfigError::invalid_thread_url(&self.thread_url, err.to_string()))
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            thread_url: String::new(),
            workers: DEFAULT_WORKERS,
            crawl_links: false,
            crawl_images: false,
            dest_path: PathBuf::from(DEFAULT_DEST_DIR),
            retries: DEFAULT_RETRIES,
            pages: Vec::new(),
            from_page: 0,
            to_page: 0,
        }
    }
}
