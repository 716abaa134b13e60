//! CLI entry point for the threadcrawl tool.

use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use threadcrawl::{CrawlConfig, CrawlOutcome, crawl};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    match run(args).await {
        Ok(outcome) => ExitCode::from(exit_code(&outcome)),
        Err(err) => {
            error!(error = %format!("{err:#}"), "crawl failed");
            ExitCode::from(2)
        }
    }
}

async fn run(args: Args) -> Result<CrawlOutcome> {
    let (from_page, to_page) = cli::parse_page_range(&args.range).map_err(anyhow::Error::msg)?;

    let mut config = CrawlConfig {
        thread_url: args.thread_url.clone(),
        workers: usize::from(args.workers),
        crawl_links: args.crawl_links,
        crawl_images: args.crawl_images,
        dest_path: args.output.clone().unwrap_or_default(),
        retries: u32::from(args.retries),
        pages: args.page_list(),
        from_page,
        to_page,
    };
    config.validate().context("invalid configuration")?;

    // Translate SIGINT into the pipeline's cancellation signal.
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "unable to listen for shutdown signal");
            return;
        }
        info!("shutdown signal received");
        signal_token.cancel();
    });

    let started = Instant::now();
    let outcome = crawl(&config, cancel).await?;

    if outcome.cancelled {
        info!("crawl cancelled by user");
    } else {
        info!(
            succeeded = outcome.success_pages.len(),
            failed = outcome.failed_pages.len(),
            links = outcome.links_found,
            images = outcome.images_found,
            elapsed = ?started.elapsed(),
            "crawl finished"
        );
    }

    Ok(outcome)
}

/// Maps the crawl outcome to the process exit code.
///
/// Cancellation and full success exit 0; a crawl where some pages failed
/// permanently but others succeeded exits 1; a crawl where every page failed
/// exits 2.
fn exit_code(outcome: &CrawlOutcome) -> u8 {
    if outcome.cancelled || outcome.failed_pages.is_empty() {
        0
    } else if outcome.success_pages.is_empty() {
        2
    } else {
        1
    }
}
