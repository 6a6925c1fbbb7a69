//! Shared streaming helpers: range parsing, content-type mapping, and
//! chunked file serving via `ReaderStream`.

use std::path::Path;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

/// Read size for file bodies.
const CHUNK_SIZE: usize = 64 * 1024;

/// A single byte range from a `Range` header, before it is checked against
/// the file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=START-` or `bytes=START-END`.
    From { start: u64, end: Option<u64> },
    /// `bytes=-N`: the last N bytes.
    Suffix(u64),
}

/// Parse a `Range: bytes=...` header value.
///
/// Only single ranges are supported. Anything else, including
/// `start > end`, is [`pk_core::Error::InvalidRequest`].
pub fn parse_range_header(value: &str) -> pk_core::Result<ByteRange> {
    let invalid = || pk_core::Error::invalid(format!("malformed Range header: {value:?}"));

    let spec = value.trim().strip_prefix("bytes=").ok_or_else(invalid)?.trim();
    if spec.contains(',') {
        return Err(pk_core::Error::invalid("multiple ranges are not supported"));
    }

    let (start_str, end_str) = spec.split_once('-').ok_or_else(invalid)?;
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    if start_str.is_empty() {
        let n: u64 = end_str.parse().map_err(|_| invalid())?;
        return Ok(ByteRange::Suffix(n));
    }

    let start: u64 = start_str.parse().map_err(|_| invalid())?;
    let end = if end_str.is_empty() {
        None
    } else {
        Some(end_str.parse::<u64>().map_err(|_| invalid())?)
    };

    if matches!(end, Some(end) if start > end) {
        return Err(pk_core::Error::invalid(format!(
            "range start {start} is after end"
        )));
    }

    Ok(ByteRange::From { start, end })
}

impl ByteRange {
    /// Inclusive `(start, end)` within a file of `size` bytes. An end past
    /// the file is clamped to the last byte.
    pub fn resolve(self, size: u64) -> pk_core::Result<(u64, u64)> {
        let unsatisfiable = pk_core::Error::RangeNotSatisfiable { size };
        match self {
            ByteRange::From { start, end } => {
                if start >= size {
                    return Err(unsatisfiable);
                }
                let end = end.unwrap_or(size - 1).min(size - 1);
                Ok((start, end))
            }
            ByteRange::Suffix(n) => {
                if n == 0 || size == 0 {
                    return Err(unsatisfiable);
                }
                Ok((size.saturating_sub(n), size - 1))
            }
        }
    }
}

/// MIME type for a video container extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match pk_core::paths::lowercase_extension(path).as_deref() {
        Some("mp4") => "video/mp4",
        Some("m4v") => "video/x-m4v",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        Some("wmv") => "video/x-ms-wmv",
        Some("flv") => "video/x-flv",
        Some("webm") => "video/webm",
        _ => "application/octet-stream",
    }
}

/// Serve a file using chunked streaming via `ReaderStream`.
///
/// Reads are done in 64KB chunks so memory stays bounded regardless of
/// file size. With a `Range` header only the requested slice is read.
pub async fn serve_file_streaming(
    file_path: &Path,
    range_header: Option<&str>,
) -> Result<Response, pk_core::Error> {
    let metadata = tokio::fs::metadata(file_path)
        .await
        .map_err(|_| pk_core::Error::not_found("file", file_path.display()))?;

    let file_size = metadata.len();
    let content_type = content_type_for(file_path);

    // Validate the header before opening the file.
    let range = range_header
        .map(|h| parse_range_header(h).and_then(|r| r.resolve(file_size)))
        .transpose()?;

    let mut file = tokio::fs::File::open(file_path)
        .await
        .map_err(|_| pk_core::Error::not_found("file", file_path.display()))?;

    match range {
        Some((start, end)) => {
            let length = end - start + 1;

            file.seek(std::io::SeekFrom::Start(start)).await?;

            // Wrap in a Take to limit reads to exactly `length` bytes.
            let limited = file.take(length);
            let body = Body::from_stream(ReaderStream::with_capacity(limited, CHUNK_SIZE));

            tracing::debug!(
                file = %file_path.display(),
                start,
                end,
                size = file_size,
                "Serving byte range"
            );

            Ok((
                StatusCode::PARTIAL_CONTENT,
                [
                    (header::CONTENT_TYPE, content_type.to_string()),
                    (header::CONTENT_RANGE, format!("bytes {start}-{end}/{file_size}")),
                    (header::CONTENT_LENGTH, length.to_string()),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                    (header::CACHE_CONTROL, "no-cache".to_string()),
                ],
                body,
            )
                .into_response())
        }
        None => {
            let body = Body::from_stream(ReaderStream::with_capacity(file, CHUNK_SIZE));

            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type.to_string()),
                    (header::CONTENT_LENGTH, file_size.to_string()),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                    (header::CACHE_CONTROL, "no-cache".to_string()),
                ],
                body,
            )
                .into_response())
        }
    }
}

/// Percent-encode a query parameter value.
pub fn urlencoded(s: &str) -> String {
    const HEX: [u8; 16] = *b"0123456789ABCDEF";
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(b as char);
            }
            _ => {
                out.push('%');
                out.push(char::from(HEX[(b >> 4) as usize]));
                out.push(char::from(HEX[(b & 0x0f) as usize]));
            }
        }
    }
    out
}
