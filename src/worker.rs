//! Background poll worker
//!
//! Runs a [`PollingFetcher`] on its own task and reports each update over a
//! channel. Updates are read to the end before the next poll starts, so the
//! receiver gets owned bytes and the transfer is never left half-read.
//!
//! The task exits when the worker handle is dropped or when the event
//! receiver is dropped.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backend::ObjectBackend;
use crate::error::FetcherError;
use crate::fetcher::PollingFetcher;
use crate::pacing::Sleeper;

/// Fully read content of one object version
#[derive(Debug, Clone)]
pub struct FetchedContent {
    pub change_token: String,
    pub content: Vec<u8>,
    pub decoded: bool,
    pub fetched_at: DateTime<Utc>,
}

/// Events emitted by the worker
#[derive(Debug)]
pub enum PollEvent {
    /// The object changed and its content was read
    Updated(FetchedContent),
    /// A poll failed; polling continues on the next interval
    Failed(FetcherError),
    /// The worker exited; always the last event
    Stopped,
}

/// Background poll worker
pub struct PollWorker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PollWorker {
    /// Start polling on a new task.
    ///
    /// `buffer` bounds the event channel; a slow receiver pauses polling.
    pub fn start<B, S>(
        mut fetcher: PollingFetcher<B, S>,
        buffer: usize,
    ) -> (Self, mpsc::Receiver<PollEvent>)
    where
        B: ObjectBackend + 'static,
        S: Sleeper + 'static,
    {
        let (sender, receiver) = mpsc::channel::<PollEvent>(buffer.max(1));
        let cancel = fetcher.cancellation_token();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            loop {
                let result = tokio::select! {
                    biased;
                    _ = sender.closed() => {
                        tracing::debug!("Event receiver dropped, stopping poll worker");
                        break;
                    }
                    result = fetcher.fetch() => result,
                };

                let event = match result {
                    Ok(None) => continue,
                    Ok(Some(update)) => {
                        let change_token = update.change_token().to_string();
                        let decoded = update.is_decoded();

                        let read = tokio::select! {
                            biased;
                            _ = token.cancelled() => break,
                            read = update.read_to_end() => read,
                        };

                        match read {
                            Ok(content) => {
                                tracing::info!(
                                    "Fetched {} bytes (etag {})",
                                    content.len(),
                                    change_token
                                );
                                PollEvent::Updated(FetchedContent {
                                    change_token,
                                    content,
                                    decoded,
                                    fetched_at: Utc::now(),
                                })
                            }
                            Err(e) => {
                                tracing::error!("Reading object content failed: {}", e);
                                PollEvent::Failed(FetcherError::Retrieval(Box::new(e)))
                            }
                        }
                    }
                    Err(FetcherError::Cancelled) => break,
                    Err(e) => {
                        tracing::error!("Poll failed: {}", e);
                        PollEvent::Failed(e)
                    }
                };

                if sender.send(event).await.is_err() {
                    tracing::debug!("Event receiver dropped, stopping poll worker");
                    break;
                }
            }

            let _ = sender.send(PollEvent::Stopped).await;
            tracing::info!("Poll worker stopped");
        });

        (Self { cancel, handle }, receiver)
    }

    /// Token that stops the worker when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop polling. Interrupts the current sleep or request.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop and wait for the task to exit
    pub async fn shutdown(mut self) {
        self.stop();
        if let Err(e) = (&mut self.handle).await {
            tracing::error!("Poll worker task failed: {}", e);
        }
    }
}

impl Drop for PollWorker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
