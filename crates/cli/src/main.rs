// ABOUTME: CLI for unfurling URLs with unfurl-core and printing JSON results.
// ABOUTME: Accepts positional URLs or free text and mirrors the service configuration knobs.

use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use unfurl_core::Service;

/// Unfurl one or more URLs and output JSON metadata.
#[derive(Parser, Debug)]
#[command(name = "unfurl")]
#[command(about = "Fetch URL metadata (title, description, preview image) as JSON", long_about = None)]
struct Args {
    /// URLs to unfurl.
    #[arg(conflicts_with = "content")]
    urls: Vec<String>,

    /// Free text to scan for URLs instead of positional arguments.
    #[arg(long)]
    content: Option<String>,

    /// Timeout for remote i/o, in seconds.
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Byte ceiling read from each response body.
    #[arg(long, default_value_t = unfurl_core::DEFAULT_MAX_BODY_CHUNK_SIZE)]
    max_chunk_size: usize,

    /// Fetch image dimensions where possible (extra external request per image).
    #[arg(long, default_value_t = false)]
    with_dimensions: bool,

    /// Extra outbound header as key=value; repeatable.
    #[arg(long = "header", value_name = "KEY=VALUE")]
    headers: Vec<String>,

    /// Forbidden URL prefix; matching URLs return bare records. Repeatable.
    #[arg(long = "blacklist-prefix", value_name = "PREFIX")]
    blacklist_prefixes: Vec<String>,

    /// Forbidden title fragment (case-insensitive). Repeatable.
    #[arg(long = "blacklist-title", value_name = "FRAGMENT")]
    blacklist_titles: Vec<String>,

    /// Output compact JSON instead of pretty.
    #[arg(long, default_value_t = false)]
    compact: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if args.urls.is_empty() && args.content.is_none() {
        bail!("provide URLs or --content text to scan");
    }

    let mut builder = Service::builder()
        .timeout(Duration::from_secs(args.timeout))
        .max_body_chunk_size(args.max_chunk_size)
        .fetch_image_size(args.with_dimensions);

    for header in &args.headers {
        let Some((key, value)) = header.split_once('=') else {
            bail!("invalid --header {:?}, expected KEY=VALUE", header);
        };
        builder = builder.header(key, value);
    }
    for prefix in &args.blacklist_prefixes {
        builder = builder.blacklist_prefix(prefix);
    }
    for fragment in &args.blacklist_titles {
        builder = builder.blacklist_title(fragment);
    }
    let service = builder.build();

    let cancel = CancellationToken::new();
    let results = match &args.content {
        Some(content) => service.unfurl_text(&cancel, content).await,
        None => service.unfurl(&cancel, &args.urls).await,
    };

    let output = if args.compact {
        serde_json::to_string(&results)?
    } else {
        serde_json::to_string_pretty(&results)?
    };
    println!("{}", output);
    Ok(())
}
