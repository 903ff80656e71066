//! S3 Fetcher CLI
//!
//! Polls one S3 object and writes its content out each time it changes.
//!
//! Run with: s3-fetcher --bucket my-bucket --key feeds/latest.json.gz -o latest.json

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fetcher::error::{FetcherError, Result};
use fetcher::{output, FetcherConfig, PollingFetcher, Update};

#[derive(Parser, Debug)]
#[command(name = "s3-fetcher")]
#[command(about = "Poll an S3 object and emit its content when it changes")]
#[command(version)]
struct Args {
    /// S3 bucket
    #[arg(long, env = "S3_FETCHER_BUCKET")]
    bucket: String,

    /// Object key (keys ending in .gz are gunzipped if not served gzip-encoded)
    #[arg(long, env = "S3_FETCHER_KEY")]
    key: String,

    /// Access key (falls back to AWS_ACCESS_KEY_ID, then anonymous)
    #[arg(long, env = "S3_FETCHER_ACCESS_KEY")]
    access_key: Option<String>,

    /// Secret key
    #[arg(long, env = "S3_FETCHER_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// AWS region (default ap-southeast-2)
    #[arg(long, env = "S3_FETCHER_REGION")]
    region: Option<String>,

    /// Endpoint override for S3-compatible servers
    #[arg(long, env = "S3_FETCHER_ENDPOINT")]
    endpoint: Option<String>,

    /// Use path-style addressing
    #[arg(long, env = "S3_FETCHER_PATH_STYLE")]
    path_style: bool,

    /// Trust only the bundled Amazon root certificates
    #[arg(long, env = "S3_FETCHER_EMBEDDED_CERT")]
    embedded_cert: bool,

    /// Seconds between polls (default 300)
    #[arg(long, env = "S3_FETCHER_INTERVAL_SECS")]
    interval_secs: Option<u64>,

    /// Write each update to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Fetch once and exit
    #[arg(long)]
    once: bool,

    /// Log as JSON
    #[arg(long, env = "S3_FETCHER_JSON_LOGS")]
    json_logs: bool,
}

impl Args {
    fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            bucket: self.bucket.clone(),
            key: self.key.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            force_path_style: self.path_style,
            use_embedded_cert: self.embedded_cert,
            interval: self.interval_secs.map(Duration::from_secs),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries object content
    let registry =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::from_default_env());
    if args.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .init();
    }

    let mut fetcher = PollingFetcher::initialize(args.fetcher_config()).await?;

    let cancel = fetcher.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping");
            cancel.cancel();
        }
    });

    loop {
        match fetcher.fetch().await {
            Ok(Some(update)) => {
                let token = update.change_token().to_string();
                match write_update(update, args.output.as_deref()).await {
                    Ok(written) => tracing::info!("Wrote {} bytes (etag {})", written, token),
                    Err(e) if args.once => return Err(e),
                    Err(e) => tracing::error!("Writing etag {} failed: {}", token, e),
                }
            }
            Ok(None) => {}
            Err(FetcherError::Cancelled) => break,
            Err(e) if args.once => return Err(e),
            Err(e) => tracing::error!("Fetch failed: {}", e),
        }

        if args.once {
            break;
        }
    }

    Ok(())
}

/// Stream an update to stdout or, via a temp file and rename, to `destination`
async fn write_update(mut update: Update, destination: Option<&Path>) -> Result<u64> {
    match destination {
        Some(path) => output::write_atomic(&mut update, path).await,
        None => output::write_stdout(&mut update).await,
    }
}
