//! Page fetch worker pool with per-task retry.
//!
//! Each worker pulls page tasks from a shared queue and owns a task to
//! completion: retries loop inside the worker with a randomized backoff
//! instead of requeueing onto a shared channel, so no poison-pill handling
//! is needed and a task is never processed by two workers.
//!
//! The workers hold the only senders of the document channel; when the last
//! worker exits the channel closes, signalling "no more documents" to the
//! extraction stage.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::Rng;
use reqwest::Client;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::report::PageLedger;

/// Backoff between page fetch attempts is uniform in `[MIN, MAX)` seconds.
const BACKOFF_MIN_SECS: u64 = 2;
const BACKOFF_MAX_SECS: u64 = 10;

/// One page to fetch. Created by the resolver, consumed by exactly one
/// worker; the attempt counter lives in that worker's retry loop.
#[derive(Debug, Clone)]
pub(crate) struct PageTask {
    pub(crate) url: String,
    pub(crate) number: u32,
}

impl PageTask {
    pub(crate) fn new(thread_url: &str, number: u32) -> Self {
        Self {
            url: format!("{thread_url}&page={number}"),
            number,
        }
    }
}

/// A successfully fetched page, owned by the extraction stage from here on.
#[derive(Debug)]
pub(crate) struct FetchedPage {
    pub(crate) number: u32,
    pub(crate) html: String,
}

/// Failures that make a fetch attempt retryable.
#[derive(Debug, Error)]
enum FetchFailure {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    Status(u16),
}

/// Spawns `count` workers draining the shared page task queue.
pub(crate) fn spawn_fetch_workers(
    count: usize,
    client: &Client,
    tasks: &Arc<Mutex<VecDeque<PageTask>>>,
    documents: &mpsc::Sender<FetchedPage>,
    ledger: &Arc<PageLedger>,
    retries: u32,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|worker| {
            tokio::spawn(run_fetch_worker(
                worker,
                client.clone(),
                Arc::clone(tasks),
                documents.clone(),
                Arc::clone(ledger),
                retries,
                cancel.clone(),
            ))
        })
        .collect()
}

async fn run_fetch_worker(
    worker: usize,
    client: Client,
    tasks: Arc<Mutex<VecDeque<PageTask>>>,
    documents: mpsc::Sender<FetchedPage>,
    ledger: Arc<PageLedger>,
    retries: u32,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            info!(worker, "page worker terminated");
            return;
        }
        let Some(task) = next_task(&tasks) else {
            debug!(worker, "page worker done");
            return;
        };
        fetch_with_retry(worker, &client, &task, retries, &documents, &ledger, &cancel).await;
    }
}

fn next_task(tasks: &Mutex<VecDeque<PageTask>>) -> Option<PageTask> {
    tasks
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop_front()
}

/// Attempts one page up to `retries` times, recording the terminal outcome.
///
/// Cancellation mid-task records nothing: the page is neither a success nor
/// a permanent failure.
async fn fetch_with_retry(
    worker: usize,
    client: &Client,
    task: &PageTask,
    retries: u32,
    documents: &mpsc::Sender<FetchedPage>,
    ledger: &PageLedger,
    cancel: &CancellationToken,
) {
    for attempt in 1..=retries {
        if cancel.is_cancelled() {
            return;
        }

        debug!(worker, page = task.number, attempt, url = %task.url, "fetching page");
        match fetch_page(client, &task.url).await {
            Ok(html) => {
                if documents
                    .send(FetchedPage {
                        number: task.number,
                        html,
                    })
                    .await
                    .is_err()
                {
                    // Extraction stage is gone; shutdown is under way.
                    return;
                }
                ledger.record_success(task.number);
                info!(worker, page = task.number, "page fetched");
                return;
            }
            Err(err) => {
                debug!(worker, page = task.number, attempt, error = %err, "fetch attempt failed");
                if attempt < retries {
                    tokio::select! {
                        () = cancel.cancelled() => return,
                        () = tokio::time::sleep(backoff_delay()) => {}
                    }
                }
            }
        }
    }

    ledger.record_failure(task.number);
    warn!(page = task.number, url = %task.url, "retry budget exhausted");
}

async fn fetch_page(client: &Client, url: &str) -> Result<String, FetchFailure> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchFailure::Status(status.as_u16()));
    }
    Ok(response.text().await?)
}

/// Uniformly random backoff; jitter spreads retries so workers hitting the
/// same struggling server do not stampede it in lockstep.
fn backoff_delay() -> Duration {
    let secs = rand::thread_rng().gen_range(BACKOFF_MIN_SECS..BACKOFF_MAX_SECS);
    Duration::from_secs(secs)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_page_task_url_appends_page_parameter() {
        let task = PageTask::new("https://forum.example.com/thread?t=42", 7);
        assert_eq!(task.url, "https://forum.example.com/thread?t=42&page=7");
        assert_eq!(task.number, 7);
    }

    #[test]
    fn test_backoff_delay_stays_in_range() {
        for _ in 0..200 {
            let delay = backoff_delay();
            assert!(delay >= Duration::from_secs(BACKOFF_MIN_SECS));
            assert!(delay < Duration::from_secs(BACKOFF_MAX_SECS));
        }
    }

    #[test]
    fn test_next_task_drains_queue_exactly_once() {
        let tasks = Mutex::new(VecDeque::from(vec![
            PageTask::new("https://forum.example.com/t?t=1", 1),
            PageTask::new("https://forum.example.com/t?t=1", 2),
        ]));
        assert_eq!(next_task(&tasks).unwrap().number, 1);
        assert_eq!(next_task(&tasks).unwrap().number, 2);
        assert!(next_task(&tasks).is_none());
    }
}
