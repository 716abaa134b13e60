//! Page bookkeeping and metadata export.
//!
//! Fetch workers record every page's terminal outcome in the [`PageLedger`];
//! after the pipeline has drained, the exporter serializes the dedup records
//! and the crawl report. Artifacts are independent: one failing write never
//! aborts the others.

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::{info, warn};

use super::store::DedupStore;
use crate::config::CrawlConfig;

/// Links metadata artifact filename under the destination root.
pub const LINKS_ARTIFACT: &str = "links_metadata.json";

/// Images metadata artifact filename under the destination root.
pub const IMAGES_ARTIFACT: &str = "images_metadata.json";

/// Crawl report artifact filename under the destination root.
pub const REPORT_ARTIFACT: &str = "report.json";

#[derive(Debug, Default)]
struct PageOutcomes {
    success: Vec<u32>,
    failed: Vec<u32>,
}

/// Shared record of which pages succeeded and which exhausted their retries.
///
/// Written by many fetch workers, read once after the pool's join barrier.
#[derive(Debug, Default)]
pub struct PageLedger {
    outcomes: Mutex<PageOutcomes>,
}

impl PageLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a page that was fetched and published downstream.
    pub fn record_success(&self, page: u32) {
        self.lock().success.push(page);
    }

    /// Records a page that exhausted its retry budget.
    pub fn record_failure(&self, page: u32) {
        self.lock().failed.push(page);
    }

    /// Returns the success and failure page lists recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> (Vec<u32>, Vec<u32>) {
        let outcomes = self.lock();
        (outcomes.success.clone(), outcomes.failed.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PageOutcomes> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Serialized shape of the `report.json` artifact.
#[derive(Debug, Serialize)]
pub struct CrawlReport<'a> {
    /// Echo of the effective configuration.
    pub config: &'a CrawlConfig,
    /// Pages fetched and extracted.
    pub success_pages: &'a [u32],
    /// Pages that exhausted their retry budget.
    pub failed_pages: &'a [u32],
}

/// Writes the enabled metadata artifacts under the destination root.
///
/// Records are sorted ascending by occurrence count. The report is written
/// only when at least one page reached a terminal outcome.
pub(crate) async fn export_artifacts(
    config: &CrawlConfig,
    store: &DedupStore,
    ledger: &PageLedger,
) {
    if config.crawl_links {
        write_artifact(&config.dest_path.join(LINKS_ARTIFACT), &store.links_by_seen()).await;
    }

    if config.crawl_images {
        write_artifact(
            &config.dest_path.join(IMAGES_ARTIFACT),
            &store.images_by_seen(),
        )
        .await;
    }

    let (success_pages, failed_pages) = ledger.snapshot();
    if !success_pages.is_empty() || !failed_pages.is_empty() {
        write_artifact(
            &config.dest_path.join(REPORT_ARTIFACT),
            &CrawlReport {
                config,
                success_pages: &success_pages,
                failed_pages: &failed_pages,
            },
        )
        .await;
    }
}

async fn write_artifact<T: Serialize>(path: &Path, data: &T) {
    let bytes = match serde_json::to_vec_pretty(data) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to serialize artifact");
            return;
        }
    };
    if let Err(err) = tokio::fs::write(path, bytes).await {
        warn!(path = %path.display(), error = %err, "failed to write artifact");
        return;
    }
    info!(path = %path.display(), "metadata exported");
}
