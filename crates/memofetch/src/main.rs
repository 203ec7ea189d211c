//! memofetch - fetch URL prefixes through a bounded LFU result cache

mod fetch;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use freqcache::SharedCache;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::fetch::CachedFetcher;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URLs to fetch, in call order (repeats are served from the cache)
    #[arg(required = true)]
    urls: Vec<String>,

    /// Cache capacity (number of responses)
    #[arg(short, long, default_value_t = 3, env = "MEMOFETCH_CAPACITY")]
    capacity: usize,

    /// Bytes of each body to keep (0 keeps the whole body)
    #[arg(short = 'n', long, default_value_t = 100)]
    first_n: usize,

    /// Per-request timeout in seconds
    #[arg(short, long, default_value_t = 10)]
    timeout: u64,

    /// Continue with the remaining URLs after a failed fetch
    #[arg(short, long)]
    keep_going: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    info!("Starting memofetch v{}", env!("CARGO_PKG_VERSION"));
    info!("Cache capacity: {}", args.capacity);

    let cache = SharedCache::new(args.capacity).context("invalid --capacity")?;
    let fetcher = CachedFetcher::new(cache, args.first_n, Duration::from_secs(args.timeout))
        .context("building HTTP client")?;

    let mut failed = 0usize;
    for url in &args.urls {
        match fetcher.get(url).await {
            Ok((body, outcome)) => {
                println!("{:<4} {} ({} bytes)", outcome.as_str(), url, body.len());
            }
            Err(e) => {
                failed += 1;
                error!("Fetching {} failed: {}", url, e);
                if !args.keep_going {
                    return Err(e).with_context(|| format!("fetching {}", url));
                }
            }
        }
    }

    let stats = fetcher.stats();
    println!("\n{} entries cached, {}", fetcher.cached(), stats);

    if failed > 0 {
        anyhow::bail!("{} of {} fetches failed", failed, args.urls.len());
    }
    Ok(())
}
