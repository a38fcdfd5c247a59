//! huginn: fetch JSON resources through an orchestration engine.
//!
//! Handy for checking how a config behaves against real upstreams: every
//! URL is fetched concurrently, repeated URLs share one call or are served
//! from cache, and the engine stats are printed at the end. With
//! `--context` the fetches run under a cancellable navigation context
//! instead, which bypasses sharing.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use huginn::{Engine, EngineConfig, HuginnError, http};

/// Fetch JSON resources through a huginn engine.
#[derive(Parser)]
#[command(name = "huginn")]
#[command(version = huginn::PKG_VERSION)]
#[command(about = "Fetch JSON through a deduplicating, retrying, caching engine")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "HUGINN_CONFIG")]
    config: Option<PathBuf>,

    /// Navigation context the requests run under.
    #[arg(long)]
    context: Option<String>,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Fetch every URL this many times (later rounds hit the cache).
    #[arg(long, default_value_t = 1)]
    rounds: u32,

    /// URLs to fetch. The URL doubles as the request key.
    #[arg(required = true)]
    urls: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = EngineConfig::load_or_default(args.config.as_deref())?;
    let engine: Engine<serde_json::Value> = Engine::new(config)?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()
        .map_err(HuginnError::from)?;

    if let Some(context) = &args.context {
        engine.new_cancellation_token(context);
    }
    info!(urls = args.urls.len(), rounds = args.rounds, "fetching");

    let mut failures = 0usize;
    for round in 1..=args.rounds {
        let fetches = args.urls.iter().map(|url| {
            let engine = engine.clone();
            let client = client.clone();
            let url = url.clone();
            let context = args.context.clone();
            tokio::spawn(async move {
                let target = url.clone();
                let result = engine
                    .fetch(&url, context.as_deref(), move || {
                        http::get_json(client.clone(), target.clone())
                    })
                    .await;
                (url, result)
            })
        });
        let handles: Vec<_> = fetches.collect();

        for handle in handles {
            let (url, result) = handle.await?;
            match result {
                Ok(body) => {
                    if round == args.rounds {
                        println!("{url}\n{}", serde_json::to_string_pretty(&body)?);
                    }
                }
                Err(e) => {
                    failures += 1;
                    eprintln!("{url}: {e}");
                }
            }
        }
    }

    let stats = engine.stats();
    eprintln!(
        "requests: {}  cache hits: {}  total latency: {:?}",
        stats.requests, stats.cache_hits, stats.total_latency
    );

    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}
