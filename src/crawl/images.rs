//! Image download worker pool.
//!
//! Workers share one task channel and follow a single-attempt policy: any
//! fetch or write failure is logged and the task dropped, never retried and
//! never fatal to the pool. Downloaded images are classified by pixel size;
//! small ones (and images whose header cannot be decoded) are routed to the
//! emoticon subdirectory.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageReader;
use reqwest::Client;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Subdirectory of the destination root holding downloaded images.
pub(crate) const IMAGE_DIR: &str = "img";

/// Subdirectory of [`IMAGE_DIR`] holding images classified as emoticons.
pub(crate) const EMOTICON_DIR: &str = "emoticons";

/// Images whose width and height are both at or below this are emoticons.
const EMOTICON_MAX_DIMENSION: u32 = 120;

/// One image download, emitted by the extraction stage on first sighting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTask {
    /// The image source URL.
    pub url: String,
    /// Filename to store the image under.
    pub filename: String,
}

/// Spawns `count` workers draining the image task channel.
///
/// The receiver is shared behind a mutex; each worker blocks on
/// {cancellation, next task} and exits when the channel closes or the token
/// fires. All receiver handles drop with the workers, which is what lets the
/// senders observe a closed channel during shutdown.
pub(crate) fn spawn_image_workers(
    count: usize,
    client: &Client,
    tasks: mpsc::Receiver<ImageTask>,
    dest_path: &Path,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    let tasks = Arc::new(Mutex::new(tasks));
    (0..count)
        .map(|worker| {
            tokio::spawn(run_image_worker(
                worker,
                client.clone(),
                Arc::clone(&tasks),
                dest_path.to_path_buf(),
                cancel.clone(),
            ))
        })
        .collect()
}

async fn run_image_worker(
    worker: usize,
    client: Client,
    tasks: Arc<Mutex<mpsc::Receiver<ImageTask>>>,
    dest_path: PathBuf,
    cancel: CancellationToken,
) {
    loop {
        let task = {
            let mut queue = tasks.lock().await;
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!(worker, "image worker terminated");
                    return;
                }
                task = queue.recv() => task,
            }
        };
        let Some(task) = task else {
            debug!(worker, "image worker done");
            return;
        };
        download_image(worker, &client, &task, &dest_path).await;
    }
}

/// Fetches one image and writes it under `img/` or `img/emoticons/`.
async fn download_image(worker: usize, client: &Client, task: &ImageTask, dest_path: &Path) {
    let response = match client.get(&task.url).send().await {
        Ok(response) => response,
        Err(err) => {
            warn!(worker, url = %task.url, error = %err, "failed to fetch image");
            return;
        }
    };
    let status = response.status();
    if !status.is_success() {
        warn!(worker, url = %task.url, %status, "failed to fetch image");
        return;
    }
    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(worker, url = %task.url, error = %err, "failed to read image body");
            return;
        }
    };

    let mut dir = dest_path.join(IMAGE_DIR);
    if is_emoticon(&bytes) {
        dir = dir.join(EMOTICON_DIR);
    }
    let path = dir.join(&task.filename);
    if let Err(err) = tokio::fs::write(&path, &bytes).await {
        warn!(worker, path = %path.display(), error = %err, "failed to write image");
        return;
    }
    info!(worker, url = %task.url, file = %path.display(), "image stored");
}

/// Classifies image bytes by their header dimensions.
///
/// Only the header is decoded. An undecodable header counts as an emoticon,
/// matching the routing for genuinely tiny images.
pub(crate) fn is_emoticon(bytes: &[u8]) -> bool {
    let reader = match ImageReader::new(Cursor::new(bytes)).with_guessed_format() {
        Ok(reader) => reader,
        Err(_) => return true,
    };
    match reader.into_dimensions() {
        Ok((width, height)) => width <= EMOTICON_MAX_DIMENSION && height <= EMOTICON_MAX_DIMENSION,
        Err(err) => {
            debug!(error = %err, "could not decode image header");
            true
        }
    }
}
