//! Page range resolution.
//!
//! The thread's first page is always fetched once to learn the thread's last
//! page number from the pagination control, then the requested page selection
//! (explicit list, range, or everything) is resolved against it. Resolver
//! failures are fatal: no worker starts when the thread itself is
//! unreachable or its pagination cannot be read.

use reqwest::Client;
use scraper::Html;
use tracing::debug;

use super::error::CrawlError;
use super::extract::selector;
use crate::config::CrawlConfig;

/// Container of the pagination control on a thread page.
const PAGINATION_TABLE_SELECTOR: &str = "div.neo_column.main table";
/// The control itself; its text reads "Page 1 of N".
const PAGINATION_CONTROL_SELECTOR: &str = "td.vbmenu_control";

/// Outcome of page-range resolution.
#[derive(Debug)]
pub(crate) struct ResolvedPages {
    /// The concrete page numbers to crawl.
    pub(crate) pages: Vec<u32>,
    /// The thread's last page, kept for diagnostics.
    pub(crate) last_page: u32,
}

/// Fetches the thread's first page and resolves the set of pages to crawl.
///
/// # Errors
///
/// - [`CrawlError::ThreadUnreachable`] when the first fetch errors or returns
///   a non-2xx status.
/// - [`CrawlError::MalformedPagination`] when the pagination control exists
///   but does not end in a page number.
/// - [`CrawlError::EmptyPageRange`] when clamping the requested range leaves
///   nothing to crawl.
pub(crate) async fn resolve_pages(
    client: &Client,
    config: &CrawlConfig,
) -> Result<ResolvedPages, CrawlError> {
    let response = client
        .get(&config.thread_url)
        .send()
        .await
        .map_err(|err| CrawlError::thread_unreachable(&config.thread_url, err.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(CrawlError::thread_unreachable(
            &config.thread_url,
            format!("HTTP {status}"),
        ));
    }
    let body = response
        .text()
        .await
        .map_err(|err| CrawlError::thread_unreachable(&config.thread_url, err.to_string()))?;

    let last_page = parse_last_page(&body)?;
    debug!(last_page, "thread pagination resolved");

    let pages = select_pages(config, last_page)?;
    Ok(ResolvedPages { pages, last_page })
}

/// Reads the thread's last page number out of the pagination control text.
///
/// A thread without the control has exactly one page.
fn parse_last_page(html: &str) -> Result<u32, CrawlError> {
    let document = Html::parse_document(html);
    let table = selector(PAGINATION_TABLE_SELECTOR);
    let control = selector(PAGINATION_CONTROL_SELECTOR);

    let text: String = document
        .select(&table)
        .next()
        .and_then(|table| table.select(&control).next())
        .map(|control| control.text().collect())
        .unwrap_or_default();
    let text = text.trim();
    if text.is_empty() {
        return Ok(1);
    }

    text.split_whitespace()
        .last()
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| CrawlError::malformed_pagination(text))
}

/// Resolves the requested page selection against the thread's last page.
///
/// Priority: explicit list, then range, then all pages.
fn select_pages(config: &CrawlConfig, last_page: u32) -> Result<Vec<u32>, CrawlError> {
    if !config.pages.is_empty() {
        return Ok(config
            .pages
            .iter()
            .copied()
            .filter(|&page| page <= last_page)
            .collect());
    }

    if config.from_page != 0 || config.to_page != 0 {
        let from = if config.from_page == 0 {
            1
        } else {
            config.from_page
        };
        let to = if config.to_page == 0 || config.to_page > last_page {
            last_page
        } else {
            config.to_page
        };
        if from > to {
            return Err(CrawlError::EmptyPageRange { from, to });
        }
        return Ok((from..=to).collect());
    }

    Ok((1..=last_page).collect())
}
