//! Forum thread crawler core library.
//!
//! This library crawls one multi-page forum thread, extracts the hyperlinks
//! and embedded images referenced in its posts, deduplicates them across the
//! whole thread, downloads the referenced images, and exports aggregate JSON
//! metadata.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - Crawl configuration and validation
//! - [`crawl`] - The crawl pipeline: page-range resolution, the page fetch
//!   worker pool, the extraction stage, the image download worker pool, and
//!   the metadata exporter
//!
//! The pipeline is cooperative: a single [`CancellationToken`] raised by the
//! caller (typically from a SIGINT handler) is observed by every blocking
//! operation, so all workers wind down within one backoff cycle.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod crawl;

// Re-export commonly used types
pub use config::{
    ConfigError, CrawlConfig, DEFAULT_RETRIES, DEFAULT_WORKERS, MAX_RETRIES, MAX_WORKERS,
};
pub use crawl::report::{
    CrawlReport, IMAGES_ARTIFACT, LINKS_ARTIFACT, PageLedger, REPORT_ARTIFACT,
};
pub use crawl::store::{DedupStore, ImageRecord, LinkRecord};
pub use crawl::{CrawlError, CrawlOutcome, ImageTask, crawl};
