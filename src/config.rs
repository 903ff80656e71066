//! Fetcher configuration and defaults

use std::time::Duration;

use crate::credentials::{self, Credentials, EnvLookup};
use crate::error::{FetcherError, Result};

/// Region used when the caller gives none
pub const DEFAULT_REGION: &str = "ap-southeast-2";

/// Poll interval used when the caller gives none
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Caller-supplied configuration for a single watched object
#[derive(Debug, Clone, Default)]
pub struct FetcherConfig {
    /// S3 bucket name (required)
    pub bucket: String,
    /// Object key (required)
    pub key: String,
    /// Explicit access key; takes priority over environment credentials
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// AWS region, defaults to [`DEFAULT_REGION`]
    pub region: Option<String>,
    /// Endpoint override for S3-compatible servers (MinIO, LocalStack)
    pub endpoint: Option<String>,
    /// Use path-style addressing (`endpoint/bucket/key`)
    pub force_path_style: bool,
    /// Trust only the bundled Amazon root certificates.
    /// Useful on devices with an old or missing certificate store.
    pub use_embedded_cert: bool,
    /// Delay between polls, defaults to [`DEFAULT_INTERVAL`]
    pub interval: Option<Duration>,
}

impl FetcherConfig {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Validate and apply defaults, resolving credentials from the process environment
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.resolve_with_env(&credentials::process_env)
    }

    /// Validate and apply defaults using the given environment lookup
    pub fn resolve_with_env(&self, env: &EnvLookup) -> Result<ResolvedConfig> {
        if self.bucket.is_empty() {
            return Err(FetcherError::config("S3 bucket not set"));
        }
        if self.key.is_empty() {
            return Err(FetcherError::config("S3 key not set"));
        }

        let region = self
            .region
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REGION)
            .to_string();

        let interval = self
            .interval
            .filter(|i| !i.is_zero())
            .unwrap_or(DEFAULT_INTERVAL);

        Ok(ResolvedConfig {
            bucket: self.bucket.clone(),
            key: self.key.clone(),
            region,
            endpoint: self.endpoint.clone().filter(|e| !e.is_empty()),
            force_path_style: self.force_path_style,
            use_embedded_cert: self.use_embedded_cert,
            interval,
            credentials: credentials::resolve(self, env),
        })
    }
}

/// Validated configuration with defaults applied
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub bucket: String,
    pub key: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub force_path_style: bool,
    pub use_embedded_cert: bool,
    pub interval: Duration,
    pub credentials: Credentials,
}

impl ResolvedConfig {
    /// `s3://bucket/key` form used in log lines
    pub fn object_uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}
