//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use threadcrawl::{DEFAULT_RETRIES, DEFAULT_WORKERS};

/// Crawl a multi-page forum thread and archive its links and images.
///
/// The crawler fetches the selected pages of one thread, collects the
/// hyperlinks and images referenced in its posts, downloads the images, and
/// writes JSON metadata under the output directory.
#[derive(Parser, Debug)]
#[command(name = "threadcrawl")]
#[command(author, version, about)]
pub struct Args {
    /// URL of the forum thread to crawl
    #[arg(short = 'u', long = "url")]
    pub thread_url: String,

    /// Number of parallel workers for page and image crawling (1-100)
    #[arg(short = 'w', long, default_value_t = DEFAULT_WORKERS as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub workers: u8,

    /// Collect hyperlinks found in posts
    #[arg(long = "links")]
    pub crawl_links: bool,

    /// Download images found in posts (requires --links)
    #[arg(long = "images")]
    pub crawl_images: bool,

    /// Directory where crawled data is written (defaults to ./data)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Attempts per page before it is recorded as failed (1-50)
    #[arg(short = 'r', long, default_value_t = DEFAULT_RETRIES as u8, value_parser = clap::value_parser!(u8).range(1..=50))]
    pub retries: u8,

    /// Comma-separated list of page numbers to crawl
    #[arg(long)]
    pub pages: Option<String>,

    /// Page range to crawl as from-to; 0 leaves that side unbounded
    #[arg(long, default_value = "0-0")]
    pub range: String,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Explicit page numbers from `--pages`; unparsable entries become 0 and
    /// are dropped by config validation.
    pub fn page_list(&self) -> Vec<u32> {
        self.pages
            .as_deref()
            .map(parse_page_list)
            .unwrap_or_default()
    }
}

/// Parses a `from-to` range string.
///
/// # Errors
///
/// Returns a message when the string is not two `-`-separated parts.
pub fn parse_page_range(raw: &str) -> Result<(u32, u32), String> {
    let parts: Vec<&str> = raw.split('-').collect();
    if parts.len() != 2 {
        return Err(format!("invalid page range '{raw}': expected from-to"));
    }
    Ok((parse_page_number(parts[0]), parse_page_number(parts[1])))
}

fn parse_page_list(raw: &str) -> Vec<u32> {
    raw.split(',').map(parse_page_number).collect()
}

fn parse_page_number(raw: &str) -> u32 {
    raw.trim().parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_defaults() {
        let args = parse(&["threadcrawl", "-u", "https://forum.example.com/t?t=1"]);
        assert_eq!(args.workers, 10);
        assert_eq!(args.retries, 20);
        assert_eq!(args.range, "0-0");
        assert!(!args.crawl_links);
        assert!(!args.crawl_images);
        assert!(args.pages.is_none());
        assert!(args.output.is_none());
    }

    #[test]
    fn test_cli_requires_thread_url() {
        let result = Args::try_parse_from(["threadcrawl"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn test_cli_workers_range_enforced() {
        let result = Args::try_parse_from([
            "threadcrawl",
            "-u",
            "https://forum.example.com/t?t=1",
            "-w",
            "0",
        ]);
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::ValueValidation
        );

        let result = Args::try_parse_from([
            "threadcrawl",
            "-u",
            "https://forum.example.com/t?t=1",
            "-w",
            "101",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_retries_range_enforced() {
        let result = Args::try_parse_from([
            "threadcrawl",
            "-u",
            "https://forum.example.com/t?t=1",
            "-r",
            "51",
        ]);
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::ValueValidation
        );
    }

    #[test]
    fn test_cli_flags_parse() {
        let args = parse(&[
            "threadcrawl",
            "-u",
            "https://forum.example.com/t?t=1",
            "--links",
            "--images",
            "-o",
            "/tmp/out",
            "-w",
            "4",
        ]);
        assert!(args.crawl_links);
        assert!(args.crawl_images);
        assert_eq!(args.output, Some(PathBuf::from("/tmp/out")));
        assert_eq!(args.workers, 4);
    }

    #[test]
    fn test_page_list_parses_and_zeroes_bad_entries() {
        let args = parse(&[
            "threadcrawl",
            "-u",
            "https://forum.example.com/t?t=1",
            "--pages",
            "2, 5,junk,9",
        ]);
        assert_eq!(args.page_list(), vec![2, 5, 0, 9]);
    }

    #[test]
    fn test_parse_page_range_accepts_from_to() {
        assert_eq!(parse_page_range("3-12"), Ok((3, 12)));
        assert_eq!(parse_page_range("0-0"), Ok((0, 0)));
    }

    #[test]
    fn test_parse_page_range_zeroes_unparsable_sides() {
        assert_eq!(parse_page_range("x-4"), Ok((0, 4)));
    }

    #[test]
    fn test_parse_page_range_rejects_wrong_shape() {
        assert!(parse_page_range("4").is_err());
        assert!(parse_page_range("1-2-3").is_err());
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = parse(&[
            "threadcrawl",
            "-u",
            "https://forum.example.com/t?t=1",
            "-vv",
        ]);
        assert_eq!(args.verbose, 2);
    }
}
