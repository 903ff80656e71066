//! Gzip decode fallback
//!
//! Objects stored as `*.gz` are usually served with `Content-Encoding: gzip`
//! and arrive already decoded by the transport. When the encoding header is
//! missing, the fetcher unwraps the gzip stream itself. If that fails once,
//! the object is assumed not to be gzip after all and decoding is never
//! attempted again for the fetcher's lifetime.

use std::io::{self, Cursor};
use std::pin::Pin;

use async_compression::tokio::bufread::GzipDecoder;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::backend::BodyReader;

/// Key suffix marking an object as a gzip archive
pub const GZIP_SUFFIX: &str = ".gz";

/// Fixed part of a gzip member header (RFC 1952)
const GZIP_HEADER_LEN: usize = 10;
const GZIP_ID1: u8 = 0x1f;
const GZIP_ID2: u8 = 0x8b;
const GZIP_DEFLATE: u8 = 8;
const GZIP_RESERVED_FLAGS: u8 = 0xe0;

/// Readable object content, decoded or raw
pub type ContentReader = Pin<Box<dyn AsyncRead + Send>>;

/// Decode fallback state for one fetcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodeFallback {
    /// No decode has been attempted yet
    #[default]
    Untried,
    /// At least one decode succeeded
    Active,
    /// A decode failed; never attempted again
    Disabled,
}

impl DecodeFallback {
    pub fn is_disabled(&self) -> bool {
        matches!(self, DecodeFallback::Disabled)
    }

    /// Next state after a decode attempt. `Disabled` is terminal.
    pub fn after_attempt(self, succeeded: bool) -> Self {
        match (self, succeeded) {
            (DecodeFallback::Disabled, _) | (_, false) => DecodeFallback::Disabled,
            (_, true) => DecodeFallback::Active,
        }
    }
}

/// Whether the transport already declared gzip encoding
pub fn declares_gzip(content_encoding: Option<&str>) -> bool {
    content_encoding
        .map(|enc| enc.to_ascii_lowercase().contains("gzip"))
        .unwrap_or(false)
}

/// Whether the fetcher should unwrap gzip itself
pub fn should_decode(key: &str, content_encoding: Option<&str>, state: DecodeFallback) -> bool {
    !state.is_disabled() && key.ends_with(GZIP_SUFFIX) && !declares_gzip(content_encoding)
}

/// Wrap a body in a streaming gzip decoder.
///
/// Reads and checks the member header up front so that content which is not
/// gzip fails here rather than midway through the caller's read.
pub async fn gzip_reader(mut body: BodyReader) -> io::Result<ContentReader> {
    let mut header = [0u8; GZIP_HEADER_LEN];
    body.read_exact(&mut header).await?;

    if header[0] != GZIP_ID1 || header[1] != GZIP_ID2 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "gzip: invalid header"));
    }
    if header[2] != GZIP_DEFLATE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("gzip: unsupported compression method {}", header[2]),
        ));
    }
    if header[3] & GZIP_RESERVED_FLAGS != 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "gzip: reserved flags set"));
    }

    let rejoined = Cursor::new(header.to_vec()).chain(body);
    let mut decoder = GzipDecoder::new(rejoined);
    decoder.multiple_members(true);
    Ok(Box::pin(decoder))
}

/// Pass a body through unchanged
pub fn raw_reader(body: BodyReader) -> ContentReader {
    Box::pin(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn body(data: Vec<u8>) -> BodyReader {
        Box::pin(Cursor::new(data))
    }

    async fn read_all(mut reader: ContentReader) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await?;
        Ok(out)
    }

    #[test]
    fn test_should_decode_policy() {
        let untried = DecodeFallback::Untried;
        assert!(should_decode("feed.json.gz", None, untried));
        assert!(should_decode("feed.json.gz", Some("identity"), untried));
        assert!(should_decode("feed.json.gz", Some(""), DecodeFallback::Active));
        assert!(!should_decode("feed.json.gz", Some("gzip"), untried));
        assert!(!should_decode("feed.json.gz", Some("x-GZIP"), untried));
        assert!(!should_decode("feed.json", None, untried));
        assert!(!should_decode("feed.gzip", None, untried));
        assert!(!should_decode("feed.json.gz", None, DecodeFallback::Disabled));
    }

    #[test]
    fn test_state_transitions() {
        assert_eq!(DecodeFallback::default(), DecodeFallback::Untried);
        assert_eq!(
            DecodeFallback::Untried.after_attempt(true),
            DecodeFallback::Active
        );
        assert_eq!(
            DecodeFallback::Active.after_attempt(false),
            DecodeFallback::Disabled
        );
        assert_eq!(
            DecodeFallback::Disabled.after_attempt(true),
            DecodeFallback::Disabled
        );
    }

    #[tokio::test]
    async fn test_gzip_reader_decodes() {
        let reader = gzip_reader(body(gzip(b"hello, world"))).await.unwrap();
        assert_eq!(read_all(reader).await.unwrap(), b"hello, world");
    }

    #[tokio::test]
    async fn test_gzip_reader_multiple_members() {
        let mut data = gzip(b"first ");
        data.extend(gzip(b"second"));
        let reader = gzip_reader(body(data)).await.unwrap();
        assert_eq!(read_all(reader).await.unwrap(), b"first second");
    }

    #[tokio::test]
    async fn test_gzip_reader_rejects_plain_content() {
        let err = gzip_reader(body(b"{\"plain\": \"json content\"}".to_vec()))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_gzip_reader_rejects_short_content() {
        let err = gzip_reader(body(vec![GZIP_ID1, GZIP_ID2]))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_raw_reader_passthrough() {
        let compressed = gzip(b"untouched");
        let reader = raw_reader(body(compressed.clone()));
        assert_eq!(read_all(reader).await.unwrap(), compressed);
    }
}
