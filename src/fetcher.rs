//! Polling fetcher
//!
//! Each call to [`PollingFetcher::fetch`] runs one round of the protocol:
//!
//! 1. wait the poll interval (skipped on the very first call)
//! 2. HEAD the object and compare its ETag with the last one seen
//! 3. on a match, report no update without transferring anything
//! 4. otherwise record the new ETag, GET the object, and hand back its body,
//!    gunzipped when the key ends in `.gz` and the transport did not decode it
//!
//! The ETag is recorded before the GET. A failed transfer is reported once
//! and that version is then treated as seen; it is only fetched again once
//! the object changes.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio_util::sync::CancellationToken;

use crate::backend::{ObjectBackend, ObjectBody};
use crate::config::{FetcherConfig, ResolvedConfig};
use crate::decode::{self, ContentReader, DecodeFallback};
use crate::error::{FetcherError, Result};
use crate::pacing::{Pacer, Sleeper, TokioSleeper};

#[cfg(feature = "s3")]
use crate::backend::S3Backend;

/// New content for the watched object
pub struct Update {
    change_token: String,
    decoded: bool,
    content_length: Option<i64>,
    reader: ContentReader,
}

impl Update {
    /// ETag of the version being delivered
    pub fn change_token(&self) -> &str {
        &self.change_token
    }

    /// True when the fetcher unwrapped gzip itself
    pub fn is_decoded(&self) -> bool {
        self.decoded
    }

    /// Transferred size as reported by the backend (before decoding)
    pub fn content_length(&self) -> Option<i64> {
        self.content_length
    }

    pub fn into_reader(self) -> ContentReader {
        self.reader
    }

    /// Drain the stream into memory
    pub async fn read_to_end(mut self) -> io::Result<Vec<u8>> {
        let mut content = Vec::new();
        self.reader.read_to_end(&mut content).await?;
        Ok(content)
    }
}

impl AsyncRead for Update {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.get_mut().reader.as_mut().poll_read(cx, buf)
    }
}

impl fmt::Debug for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Update")
            .field("change_token", &self.change_token)
            .field("decoded", &self.decoded)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Per-instance protocol state
#[derive(Debug)]
struct FetcherSession {
    /// Empty until the first successful probe of a changed object
    last_change_token: String,
    pacer: Pacer,
    decode: DecodeFallback,
}

/// Watches one object and yields its content when it changes.
///
/// `fetch` takes `&mut self`: one fetcher serves one polling loop. Independent
/// fetchers share nothing and probe independently.
pub struct PollingFetcher<B, S = TokioSleeper> {
    config: ResolvedConfig,
    backend: B,
    sleeper: S,
    session: FetcherSession,
    cancel: CancellationToken,
}

#[cfg(feature = "s3")]
impl PollingFetcher<S3Backend> {
    /// Validate config, resolve credentials and build the S3 client.
    ///
    /// No network calls are made.
    pub async fn initialize(config: FetcherConfig) -> Result<Self> {
        let resolved = config.resolve()?;
        let backend = S3Backend::from_config(&resolved).await?;

        tracing::info!(
            "Watching {} every {:?} ({} credentials, region {})",
            resolved.object_uri(),
            resolved.interval,
            resolved.credentials.source(),
            resolved.region
        );

        Ok(Self::from_parts(resolved, backend, TokioSleeper))
    }
}

impl<B: ObjectBackend, S: Sleeper> PollingFetcher<B, S> {
    /// Validate config and poll through the given backend and sleeper
    pub fn with_backend(config: &FetcherConfig, backend: B, sleeper: S) -> Result<Self> {
        Ok(Self::from_parts(config.resolve()?, backend, sleeper))
    }

    pub fn from_parts(config: ResolvedConfig, backend: B, sleeper: S) -> Self {
        let session = FetcherSession {
            last_change_token: String::new(),
            pacer: Pacer::new(config.interval),
            decode: DecodeFallback::Untried,
        };
        Self {
            config,
            backend,
            sleeper,
            session,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Token that aborts the pacing sleep and any in-flight request.
    ///
    /// Once cancelled, every later `fetch` returns [`FetcherError::Cancelled`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run one poll.
    ///
    /// Returns `Ok(None)` when the object is unchanged since the last observed
    /// version. The returned [`Update`] is a live transfer and should be fully
    /// read before the next call.
    pub async fn fetch(&mut self) -> Result<Option<Update>> {
        self.session
            .pacer
            .wait(&self.sleeper, &self.cancel)
            .await?;

        let bucket = self.config.bucket.as_str();
        let key = self.config.key.as_str();

        let head = cancellable(&self.cancel, self.backend.head_object(bucket, key))
            .await?
            .map_err(FetcherError::Probe)?;
        let change_token = head
            .e_tag
            .filter(|tag| !tag.is_empty())
            .ok_or_else(|| FetcherError::Probe("HEAD response carried no ETag".into()))?;

        if change_token == self.session.last_change_token {
            tracing::debug!(etag = %change_token, "{} unchanged", self.config.object_uri());
            return Ok(None);
        }

        tracing::info!(
            etag = %change_token,
            previous = %self.session.last_change_token,
            "{} changed, fetching",
            self.config.object_uri()
        );
        self.session.last_change_token = change_token.clone();

        let object = cancellable(&self.cancel, self.backend.get_object(bucket, key))
            .await?
            .map_err(FetcherError::Retrieval)?;

        let ObjectBody {
            content_encoding,
            content_length,
            body,
            ..
        } = object;

        if !decode::should_decode(key, content_encoding.as_deref(), self.session.decode) {
            return Ok(Some(Update {
                change_token,
                decoded: false,
                content_length,
                reader: decode::raw_reader(body),
            }));
        }

        match cancellable(&self.cancel, decode::gzip_reader(body)).await? {
            Ok(reader) => {
                self.session.decode = self.session.decode.after_attempt(true);
                Ok(Some(Update {
                    change_token,
                    decoded: true,
                    content_length,
                    reader,
                }))
            }
            Err(e) => {
                self.session.decode = self.session.decode.after_attempt(false);
                tracing::warn!(
                    "{} is not gzip ({}), decoding disabled for this fetcher",
                    self.config.object_uri(),
                    e
                );
                Err(FetcherError::Decode(e))
            }
        }
    }
}

impl<B, S> fmt::Debug for PollingFetcher<B, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingFetcher")
            .field("object", &self.config.object_uri())
            .field("interval", &self.config.interval)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// Race a future against cancellation
async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FetcherError::Cancelled),
        output = fut => Ok(output),
    }
}
