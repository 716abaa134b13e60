//! Extraction stage: a single consumer turning fetched pages into dedup
//! records and image download tasks.
//!
//! Documents are parsed here rather than in the fetch workers because the
//! parsed DOM is not `Send`. The stage is a single sequential consumer, so
//! posts within one page are always processed in document order; ordering
//! across pages carries no meaning, the dedup store is an unordered
//! accumulation.

use std::sync::Arc;

use scraper::{ElementRef, Html, Selector};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use super::fetch::FetchedPage;
use super::images::ImageTask;
use super::store::DedupStore;

/// One post block within a page.
const POST_SELECTOR: &str = "table.tborder.voz-postbit";
/// Rows of the post header table; the first one carries the post anchor.
const POST_ROW_SELECTOR: &str = "tbody tr";
/// Cell wrapper around the post anchor.
const POST_CELL_SELECTOR: &str = "td div";
/// Message body block(s) within a post.
const MESSAGE_SELECTOR: &str = "div.voz-post-message";
const ANCHOR_SELECTOR: &str = "a";
const IMAGE_SELECTOR: &str = "img";

/// Path of the forum's outbound-link redirect endpoint.
const REDIRECT_PATH: &str = "/redirect/index.php";

/// Compiles a selector known to be valid at compile time.
#[allow(clippy::expect_used)]
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid static selector")
}

/// Scans fetched documents for links and images, keyed by the two feature
/// flags, and feeds the dedup store and the image download channel.
pub(crate) struct Extractor {
    post: Selector,
    post_row: Selector,
    post_cell: Selector,
    message: Selector,
    anchor: Selector,
    image: Selector,
    origin: Url,
    crawl_links: bool,
    crawl_images: bool,
}

impl Extractor {
    pub(crate) fn new(origin: Url, crawl_links: bool, crawl_images: bool) -> Self {
        Self {
            post: selector(POST_SELECTOR),
            post_row: selector(POST_ROW_SELECTOR),
            post_cell: selector(POST_CELL_SELECTOR),
            message: selector(MESSAGE_SELECTOR),
            anchor: selector(ANCHOR_SELECTOR),
            image: selector(IMAGE_SELECTOR),
            origin,
            crawl_links,
            crawl_images,
        }
    }

    /// Consumes the document channel until it closes or cancellation fires.
    pub(crate) async fn run(
        self,
        mut documents: mpsc::Receiver<FetchedPage>,
        store: Arc<DedupStore>,
        images: Option<mpsc::Sender<ImageTask>>,
        cancel: CancellationToken,
    ) {
        loop {
            let page = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("extraction terminated");
                    return;
                }
                page = documents.recv() => page,
            };
            let Some(page) = page else {
                debug!("extraction done");
                return;
            };

            debug!(page = page.number, "extracting data");
            let tasks = self.scan_document(&page.html, &store);
            if let Some(images) = &images {
                for task in tasks {
                    if images.send(task).await.is_err() {
                        // Image pool already shut down; we are cancelling too.
                        return;
                    }
                }
            }
        }
    }

    /// Walks the document's posts in order, records links and images, and
    /// returns the download tasks for first-seen images.
    pub(crate) fn scan_document(&self, html: &str, store: &DedupStore) -> Vec<ImageTask> {
        let document = Html::parse_document(html);
        let mut tasks = Vec::new();

        for post in document.select(&self.post) {
            let post_index = self.post_index(post);
            for message in post.select(&self.message) {
                if self.crawl_links {
                    self.extract_links(message, post_index, store);
                }
                if self.crawl_images {
                    self.extract_images(message, post_index, store, &mut tasks);
                }
            }
        }

        tasks
    }

    /// Parses the post index from the post's anchor attribute.
    ///
    /// A missing or non-numeric index defaults to zero; the post is still
    /// processed.
    fn post_index(&self, post: ElementRef<'_>) -> u32 {
        post.select(&self.post_row)
            .next()
            .and_then(|row| row.select(&self.post_cell).next())
            .and_then(|cell| cell.select(&self.anchor).next())
            .and_then(|anchor| anchor.value().attr("name"))
            .and_then(|name| name.parse().ok())
            .unwrap_or(0)
    }

    fn extract_links(&self, message: ElementRef<'_>, post_index: u32, store: &DedupStore) {
        for anchor in message.select(&self.anchor) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if href.is_empty() {
                continue;
            }
            let canonical = normalize_href(href, &self.origin);
            let text: String = anchor.text().collect();
            store.record_link(&canonical, &text, post_index);
        }
    }

    fn extract_images(
        &self,
        message: ElementRef<'_>,
        post_index: u32,
        store: &DedupStore,
        tasks: &mut Vec<ImageTask>,
    ) {
        for img in message.select(&self.image) {
            let Some(src) = img.value().attr("src") else {
                continue;
            };
            // Relative and embedded (data:) sources are ignored.
            if !src.starts_with("https://") && !src.starts_with("http://") {
                continue;
            }
            if let Some(task) = store.record_image(src, post_index) {
                tasks.push(task);
            }
        }
    }
}

/// Canonicalizes an anchor href for deduplication.
///
/// A hostless URL pointing at the forum's redirect endpoint resolves to the
/// decoded `link` query parameter; any other hostless URL is taken as a path
/// off the forum's own origin; absolute URLs pass through unchanged, as does
/// anything that fails to parse.
pub(crate) fn normalize_href(href: &str, origin: &Url) -> String {
    let hostless = match Url::parse(href) {
        Ok(url) => {
            if url.host().is_some() {
                return href.to_string();
            }
            url
        }
        Err(url::ParseError::RelativeUrlWithoutBase) => match origin.join(href) {
            Ok(url) => url,
            Err(_) => return href.to_string(),
        },
        Err(_) => return href.to_string(),
    };

    if hostless.path() == REDIRECT_PATH {
        return hostless
            .query_pairs()
            .find(|(key, _)| key == "link")
            .map(|(_, value)| value.into_owned())
            .unwrap_or_default();
    }

    format!(
        "{}/{}",
        origin.as_str().trim_end_matches('/'),
        href.trim_start_matches('/')
    )
}
