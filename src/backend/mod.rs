//! Object backend abstraction
//!
//! The fetcher only needs two calls from storage: a cheap metadata probe and
//! a full retrieval. Both are expressed by [`ObjectBackend`] so the polling
//! protocol can run against S3 or against an in-process [`MemoryBackend`].
//!
//! # Feature Flags
//!
//! The S3 implementation requires the `s3` feature.

pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::AsyncBufRead;

pub use memory::MemoryBackend;
#[cfg(feature = "s3")]
pub use s3::S3Backend;

/// Opaque error from a backend call
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// Live object body, backed by the transfer
pub type BodyReader = Pin<Box<dyn AsyncBufRead + Send>>;

/// Result of a metadata probe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectHead {
    /// Change token for the current version of the object
    pub e_tag: Option<String>,
    pub content_encoding: Option<String>,
    pub content_length: Option<i64>,
    pub last_modified: Option<String>,
}

/// Result of a full retrieval
pub struct ObjectBody {
    /// Transport encoding declared on the response
    pub content_encoding: Option<String>,
    pub content_length: Option<i64>,
    pub body: BodyReader,
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBody")
            .field("content_encoding", &self.content_encoding)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Storage calls used by the polling protocol
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Metadata-only request for the object
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead, BackendError>;

    /// Full-content request for the object
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, BackendError>;
}

#[async_trait]
impl<B: ObjectBackend + ?Sized> ObjectBackend for std::sync::Arc<B> {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead, BackendError> {
        (**self).head_object(bucket, key).await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, BackendError> {
        (**self).get_object(bucket, key).await
    }
}
