//! S3 Poll Fetcher
//!
//! Watches a single S3 object and streams its content whenever it changes.
//! Changes are detected with a HEAD request and ETag comparison, so unchanged
//! objects are never downloaded. Objects stored as `*.gz` without a
//! `Content-Encoding: gzip` header are gunzipped on the fly.
//!
//! ```ignore
//! use fetcher::{FetcherConfig, PollingFetcher};
//!
//! let config = FetcherConfig::new("my-bucket", "feeds/latest.json.gz");
//! let mut fetcher = PollingFetcher::initialize(config).await?;
//! loop {
//!     if let Some(update) = fetcher.fetch().await? {
//!         let content = update.read_to_end().await?;
//!         // ...
//!     }
//! }
//! ```

pub mod backend;
pub mod config;
pub mod credentials;
pub mod decode;
pub mod error;
pub mod fetcher;
pub mod output;
pub mod pacing;
pub mod tls;
pub mod worker;

pub use backend::{MemoryBackend, ObjectBackend};
#[cfg(feature = "s3")]
pub use backend::S3Backend;
pub use config::{FetcherConfig, ResolvedConfig, DEFAULT_INTERVAL, DEFAULT_REGION};
pub use credentials::Credentials;
pub use decode::DecodeFallback;
pub use error::{FetcherError, Result};
pub use fetcher::{PollingFetcher, Update};
pub use pacing::{Sleeper, TokioSleeper};
pub use worker::{FetchedContent, PollEvent, PollWorker};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
