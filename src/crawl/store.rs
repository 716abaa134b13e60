//! Deduplication store for links and images seen across the thread.
//!
//! Two independent concurrent maps record, per canonical link URL and per raw
//! image URL, how often the item was seen and in which posts. The store is an
//! explicitly owned value injected into the extraction stage; tests get a
//! fresh instance instead of sharing process-wide state.
//!
//! Every update is a single read-modify-write on one key, performed under
//! that key's shard lock, so concurrent writers never lose counts.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};

use super::images::ImageTask;

/// Aggregated occurrence data for one link URL across the whole thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// Canonical URL after redirect/relative normalization.
    pub url: String,
    /// Anchor text from the first occurrence.
    pub text: String,
    /// How many times the URL was seen.
    pub seen_count: u32,
    /// Post indices where the URL appeared, in encounter order.
    pub post_indices: Vec<u32>,
}

/// Aggregated occurrence data for one image URL across the whole thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// The image source URL exactly as found (no normalization).
    pub url: String,
    /// Filename derived from the URL's last path segment.
    pub filename: String,
    /// How many times the URL was seen.
    pub seen_count: u32,
    /// Post indices where the image appeared, in encounter order.
    pub post_indices: Vec<u32>,
}

/// Concurrent link/image dedup maps shared by the crawl pipeline.
#[derive(Debug, Default)]
pub struct DedupStore {
    links: DashMap<String, LinkRecord>,
    images: DashMap<String, ImageRecord>,
}

impl DedupStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one sighting of a link.
    ///
    /// The first sighting creates the record and keeps this anchor's text;
    /// later sightings only bump the count and append the post index.
    pub fn record_link(&self, url: &str, text: &str, post_index: u32) {
        match self.links.entry(url.to_string()) {
            Entry::Occupied(mut seen) => {
                let record = seen.get_mut();
                record.seen_count += 1;
                record.post_indices.push(post_index);
            }
            Entry::Vacant(slot) => {
                slot.insert(LinkRecord {
                    url: url.to_string(),
                    text: text.to_string(),
                    seen_count: 1,
                    post_indices: vec![post_index],
                });
            }
        }
    }

    /// Records one sighting of an image.
    ///
    /// Returns a download task on the first sighting only; later sightings
    /// update the record without triggering another download.
    pub fn record_image(&self, url: &str, post_index: u32) -> Option<ImageTask> {
        match self.images.entry(url.to_string()) {
            Entry::Occupied(mut seen) => {
                let record = seen.get_mut();
                record.seen_count += 1;
                record.post_indices.push(post_index);
                None
            }
            Entry::Vacant(slot) => {
                let filename = filename_of(url);
                slot.insert(ImageRecord {
                    url: url.to_string(),
                    filename: filename.clone(),
                    seen_count: 1,
                    post_indices: vec![post_index],
                });
                Some(ImageTask {
                    url: url.to_string(),
                    filename,
                })
            }
        }
    }

    /// Returns all link records, sorted ascending by occurrence count.
    #[must_use]
    pub fn links_by_seen(&self) -> Vec<LinkRecord> {
        let mut records: Vec<LinkRecord> =
            self.links.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by_key(|record| record.seen_count);
        records
    }

    /// Returns all image records, sorted ascending by occurrence count.
    #[must_use]
    pub fn images_by_seen(&self) -> Vec<ImageRecord> {
        let mut records: Vec<ImageRecord> =
            self.images.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by_key(|record| record.seen_count);
        records
    }

    /// Number of distinct links recorded.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Number of distinct images recorded.
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

/// Substring after the last path separator of the raw URL.
fn filename_of(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}
