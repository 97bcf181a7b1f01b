//! Content-Encoding decoding for rewritable bodies.
//!
//! Direct mode keeps the client's `Accept-Encoding`, so textual bodies may
//! arrive compressed. Only single-coding `gzip`, `deflate` and `br` bodies
//! are decoded; anything else is passed through untouched.

use std::io::Read;

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};

use crate::error::ProxyError;

/// Normalized coding of a `Content-Encoding` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coding {
    Identity,
    Gzip,
    Deflate,
    Brotli,
}

impl Coding {
    /// Parse a header value. `None` for codings that cannot be decoded.
    pub fn parse(value: Option<&str>) -> Option<Self> {
        let Some(value) = value else {
            return Some(Self::Identity);
        };
        let value = value.trim().to_ascii_lowercase();
        match value.as_str() {
            "" | "identity" => Some(Self::Identity),
            "gzip" | "x-gzip" => Some(Self::Gzip),
            "deflate" => Some(Self::Deflate),
            "br" => Some(Self::Brotli),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
            Self::Brotli => "br",
        }
    }
}

fn read_limited<R: Read>(reader: R, coding: Coding, limit: usize) -> Result<Vec<u8>, ProxyError> {
    let mut out = Vec::new();
    reader
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|source| ProxyError::Decode {
            encoding: coding.as_str().to_string(),
            source,
        })?;
    if out.len() > limit {
        return Err(ProxyError::BodyTooLarge { limit });
    }
    Ok(out)
}

/// Decode `body`. The decoded size is bounded by `limit`.
pub fn decode_body(coding: Coding, body: Vec<u8>, limit: usize) -> Result<Vec<u8>, ProxyError> {
    match coding {
        Coding::Identity => Ok(body),
        Coding::Gzip => read_limited(GzDecoder::new(body.as_slice()), coding, limit),
        Coding::Deflate => {
            // Servers send both zlib-wrapped and raw deflate streams.
            read_limited(ZlibDecoder::new(body.as_slice()), coding, limit)
                .or_else(|_| read_limited(DeflateDecoder::new(body.as_slice()), coding, limit))
        }
        Coding::Brotli => read_limited(
            brotli_decompressor::Decompressor::new(body.as_slice(), 4096),
            coding,
            limit,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_parse_codings() {
        assert_eq!(Coding::parse(None), Some(Coding::Identity));
        assert_eq!(Coding::parse(Some("GZIP")), Some(Coding::Gzip));
        assert_eq!(Coding::parse(Some("br")), Some(Coding::Brotli));
        assert_eq!(Coding::parse(Some("gzip, br")), None);
        assert_eq!(Coding::parse(Some("zstd")), None);
    }

    #[test]
    fn test_decode_gzip_and_deflate() {
        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(b"<html>hello</html>").unwrap();
        let body = gz.finish().unwrap();
        assert_eq!(
            decode_body(Coding::Gzip, body, 1024).unwrap(),
            b"<html>hello</html>"
        );

        let mut z = ZlibEncoder::new(Vec::new(), Compression::default());
        z.write_all(b"body{}").unwrap();
        let body = z.finish().unwrap();
        assert_eq!(decode_body(Coding::Deflate, body, 1024).unwrap(), b"body{}");
    }

    #[test]
    fn test_decode_enforces_limit() {
        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(&[b'a'; 4096]).unwrap();
        let body = gz.finish().unwrap();
        assert!(matches!(
            decode_body(Coding::Gzip, body, 100),
            Err(ProxyError::BodyTooLarge { limit: 100 })
        ));
    }

    #[test]
    fn test_corrupt_body_is_decode_error() {
        assert!(matches!(
            decode_body(Coding::Gzip, b"not gzip".to_vec(), 1024),
            Err(ProxyError::Decode { .. })
        ));
    }
}
