//! Response body decompression
//!
//! Bodies are decoded here rather than by the HTTP client so that truncated
//! or corrupt upstream responses can still yield whatever was recoverable.

use crate::{FetchError, FetchResult};
use flate2::read::{GzDecoder, ZlibDecoder};
use std::io::{self, Read};

const BROTLI_BUFFER_SIZE: usize = 4096;

/// Supported `Content-Encoding` values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Gzip,
    Deflate,
    Brotli,
    Identity,
}

impl ContentEncoding {
    /// Parses a `Content-Encoding` header value
    ///
    /// Only the first comma-separated token is honored. Unknown encodings
    /// are treated as identity.
    pub fn from_header(value: &str) -> Self {
        let first = value.split(',').next().unwrap_or("").trim().to_lowercase();
        match first.as_str() {
            "gzip" | "x-gzip" => Self::Gzip,
            "deflate" => Self::Deflate,
            "br" => Self::Brotli,
            _ => Self::Identity,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
            Self::Brotli => "br",
            Self::Identity => "identity",
        }
    }
}

/// Decodes a raw response body
///
/// # Returns
///
/// * The decoded bytes when decompression succeeds
/// * The partially decoded bytes when the stream is truncated or fails a
///   gzip header/checksum check but some output was produced
/// * The raw bytes in the same cases when nothing was recovered
/// * `FetchError::Decode` for any other failure
pub fn decode_body(raw: Vec<u8>, encoding: ContentEncoding) -> FetchResult<Vec<u8>> {
    let (decoded, result) = match encoding {
        ContentEncoding::Identity => return Ok(raw),
        ContentEncoding::Gzip => read_all(GzDecoder::new(raw.as_slice())),
        ContentEncoding::Deflate => read_all(ZlibDecoder::new(raw.as_slice())),
        ContentEncoding::Brotli => {
            read_all(brotli::Decompressor::new(raw.as_slice(), BROTLI_BUFFER_SIZE))
        }
    };

    match result {
        Ok(()) => Ok(decoded),
        Err(e) if is_recoverable(&e) => {
            if decoded.is_empty() {
                tracing::debug!(
                    "Could not decode {} body ({}), using raw bytes",
                    encoding.as_str(),
                    e
                );
                Ok(raw)
            } else {
                tracing::debug!(
                    "Truncated {} body ({}), keeping {} decoded bytes",
                    encoding.as_str(),
                    e,
                    decoded.len()
                );
                Ok(decoded)
            }
        }
        Err(source) => Err(FetchError::Decode {
            encoding: encoding.as_str().to_string(),
            source,
        }),
    }
}

/// Reads until EOF or error, keeping whatever was produced before an error
fn read_all<R: Read>(mut reader: R) -> (Vec<u8>, io::Result<()>) {
    let mut out = Vec::new();
    let result = reader.read_to_end(&mut out).map(|_| ());
    (out, result)
}

/// Error message fragments of the recoverable gzip failures
const RECOVERABLE_MESSAGES: &[&str] = &["gzip header", "checksum", "unexpected end"];

/// Truncation and gzip header/checksum corruption
///
/// Every other stream error, including corrupt deflate or brotli data, is
/// fatal for the fetch.
fn is_recoverable(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        return true;
    }
    let message = err.to_string().to_lowercase();
    RECOVERABLE_MESSAGES.iter().any(|m| message.contains(m))
}
