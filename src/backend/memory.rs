//! In-process object backend
//!
//! Holds objects in memory and lets tests script failures and count calls.
//! ETags default to a hash of the content, like S3 does for single-part uploads.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{BackendError, ObjectBackend, ObjectBody, ObjectHead};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    e_tag: String,
    content_encoding: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    Head,
    Get,
}

/// Objects keyed by `(bucket, key)`
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    failures: Mutex<VecDeque<(Call, String)>>,
    head_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object; the ETag is derived from the content
    pub fn put_object(&self, bucket: &str, key: &str, data: impl Into<Vec<u8>>) {
        let data = data.into();
        let e_tag = content_etag(&data);
        self.put_object_with(bucket, key, data, e_tag, None);
    }

    /// Store an object with an explicit ETag and transport encoding
    pub fn put_object_with(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Vec<u8>>,
        e_tag: impl Into<String>,
        content_encoding: Option<&str>,
    ) {
        self.objects.lock().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data: data.into(),
                e_tag: e_tag.into(),
                content_encoding: content_encoding.map(String::from),
            },
        );
    }

    pub fn delete_object(&self, bucket: &str, key: &str) {
        self.objects
            .lock()
            .remove(&(bucket.to_string(), key.to_string()));
    }

    /// Make the next HEAD request fail with the given message
    pub fn fail_next_head(&self, message: impl Into<String>) {
        self.failures.lock().push_back((Call::Head, message.into()));
    }

    /// Make the next GET request fail with the given message
    pub fn fail_next_get(&self, message: impl Into<String>) {
        self.failures.lock().push_back((Call::Get, message.into()));
    }

    pub fn head_calls(&self) -> usize {
        self.head_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self, call: Call) -> Option<BackendError> {
        let mut failures = self.failures.lock();
        let pos = failures.iter().position(|(c, _)| *c == call)?;
        failures.remove(pos).map(|(_, message)| message.into())
    }

    fn lookup(&self, bucket: &str, key: &str) -> Result<StoredObject, BackendError> {
        self.objects
            .lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| format!("NotFound: s3://{}/{}", bucket, key).into())
    }
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead, BackendError> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.take_failure(Call::Head) {
            return Err(err);
        }

        let object = self.lookup(bucket, key)?;
        Ok(ObjectHead {
            e_tag: Some(object.e_tag),
            content_encoding: object.content_encoding,
            content_length: Some(object.data.len() as i64),
            last_modified: None,
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, BackendError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.take_failure(Call::Get) {
            return Err(err);
        }

        let object = self.lookup(bucket, key)?;
        Ok(ObjectBody {
            content_encoding: object.content_encoding,
            content_length: Some(object.data.len() as i64),
            body: Box::pin(Cursor::new(object.data)),
        })
    }
}

/// Quoted hex ETag for the content
fn content_etag(data: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    format!("\"{:016x}\"", hasher.finish())
}
