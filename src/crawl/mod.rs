//! The crawl pipeline.
//!
//! Control flow: the resolver turns the configuration into a list of page
//! tasks; a pool of fetch workers retries each page and publishes fetched
//! documents over a channel; a single extraction stage scans the documents
//! and feeds the dedup store plus an image download channel; a second pool
//! downloads the images. The stages run concurrently and are joined by
//! closing channels and awaiting worker handles, never by waiting on timers.
//!
//! A single [`CancellationToken`] is observed by every blocking operation;
//! raising it winds the whole pipeline down within one backoff cycle.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Client;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod error;
pub(crate) mod extract;
pub(crate) mod fetch;
pub(crate) mod images;
pub mod report;
mod resolver;
pub mod store;

pub use error::CrawlError;
pub use images::ImageTask;

use crate::config::CrawlConfig;
use extract::Extractor;
use fetch::PageTask;
use report::PageLedger;
use store::DedupStore;

/// HTTP connect timeout for page and image fetches.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Overall HTTP request timeout; a timed-out page fetch counts as a
/// retryable failure.
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Buffer of the image download channel (matches a busy page's worth of
/// first-seen images without blocking extraction).
const IMAGE_QUEUE_CAPACITY: usize = 5000;

/// What a finished (or cancelled) crawl produced.
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    /// Pages fetched and extracted, in completion order.
    pub success_pages: Vec<u32>,
    /// Pages that exhausted their retry budget, in completion order.
    pub failed_pages: Vec<u32>,
    /// Distinct link URLs recorded.
    pub links_found: usize,
    /// Distinct image URLs recorded.
    pub images_found: usize,
    /// Whether the crawl was cancelled before completing.
    pub cancelled: bool,
}

/// Crawls one thread according to `config`.
///
/// The configuration must have been validated. Artifacts are exported under
/// the destination path unless the crawl was cancelled; cancellation is an
/// outcome, not an error.
///
/// # Errors
///
/// Returns a [`CrawlError`] for failures that abort the crawl before the
/// pipeline produces anything: an unusable destination directory, an
/// unreachable thread, malformed pagination, or an empty page range.
pub async fn crawl(
    config: &CrawlConfig,
    cancel: CancellationToken,
) -> Result<CrawlOutcome, CrawlError> {
    info!(thread = %config.thread_url, workers = config.workers, "start crawling thread");

    tokio::fs::create_dir_all(&config.dest_path)
        .await
        .map_err(|err| CrawlError::io(&config.dest_path, err))?;

    let origin = config.forum_origin()?;
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|source| CrawlError::Client { source })?;

    let resolved = resolver::resolve_pages(&client, config).await?;
    info!(
        last_page = resolved.last_page,
        pages = resolved.pages.len(),
        "resolved pages to crawl"
    );

    let store = Arc::new(DedupStore::new());
    let ledger = Arc::new(PageLedger::new());

    let tasks: VecDeque<PageTask> = resolved
        .pages
        .iter()
        .map(|&number| PageTask::new(&config.thread_url, number))
        .collect();
    let tasks = Arc::new(Mutex::new(tasks));

    // Fetch workers hold the only document senders; the channel closing is
    // the pool's join barrier towards the extraction stage.
    let (documents_tx, documents_rx) = mpsc::channel(resolved.pages.len().max(1));
    let fetch_workers = fetch::spawn_fetch_workers(
        config.workers,
        &client,
        &tasks,
        &documents_tx,
        &ledger,
        config.retries,
        &cancel,
    );
    drop(documents_tx);

    let mut image_workers = Vec::new();
    let images_tx = if config.crawl_images {
        let emoticon_dir = config
            .dest_path
            .join(images::IMAGE_DIR)
            .join(images::EMOTICON_DIR);
        tokio::fs::create_dir_all(&emoticon_dir)
            .await
            .map_err(|err| CrawlError::io(&emoticon_dir, err))?;

        let (tx, rx) = mpsc::channel(IMAGE_QUEUE_CAPACITY);
        image_workers =
            images::spawn_image_workers(config.workers, &client, rx, &config.dest_path, &cancel);
        Some(tx)
    } else {
        None
    };

    // The extraction stage runs here; it returns when the document channel
    // closes (all fetch workers done) or cancellation fires, and drops its
    // image sender on return so the image pool can drain and exit.
    let extractor = Extractor::new(origin, config.crawl_links, config.crawl_images);
    extractor
        .run(documents_rx, Arc::clone(&store), images_tx, cancel.clone())
        .await;

    for handle in image_workers {
        if let Err(err) = handle.await {
            warn!(error = %err, "image worker task failed");
        }
    }
    for handle in fetch_workers {
        if let Err(err) = handle.await {
            warn!(error = %err, "page worker task failed");
        }
    }

    let (success_pages, failed_pages) = ledger.snapshot();
    let cancelled = cancel.is_cancelled();
    if cancelled {
        info!("crawl cancelled; skipping metadata export");
    } else {
        info!("all crawlers stopped");
        report::export_artifacts(config, &store, &ledger).await;
    }

    Ok(CrawlOutcome {
        success_pages,
        failed_pages,
        links_found: store.link_count(),
        images_found: store.image_count(),
        cancelled,
    })
}
