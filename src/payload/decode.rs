//! Payload decompression
//!
//! Clients compress telemetry with gzip (current) or zlib (some builds);
//! older clients send plain JSON. Decoding never fails: a payload that cannot
//! be decompressed is handed on unchanged and JSON parsing reports the error
//! if the bytes really are corrupt.

use flate2::read::{GzDecoder, ZlibDecoder};
use std::borrow::Cow;
use std::io::{self, Read};

/// What the normalizer did with a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Compressed input, successfully inflated
    Decompressed,
    /// No compression header; bytes used as-is
    Passthrough,
    /// Compression header present but inflating failed; bytes used as-is
    FallbackAfterError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    Gzip,
    Zlib,
}

/// Decompress `bytes` if they are compressed, otherwise return them unchanged.
pub fn normalize(bytes: &[u8]) -> Cow<'_, [u8]> {
    normalize_with_outcome(bytes).0
}

/// Like [`normalize`], also reporting which path was taken.
pub fn normalize_with_outcome(bytes: &[u8]) -> (Cow<'_, [u8]>, DecodeOutcome) {
    let Some(compression) = detect_compression(bytes) else {
        return (Cow::Borrowed(bytes), DecodeOutcome::Passthrough);
    };

    let inflated = match compression {
        Compression::Gzip => read_all(GzDecoder::new(bytes)),
        Compression::Zlib => read_all(ZlibDecoder::new(bytes)),
    };

    match inflated {
        Ok(buffer) => (Cow::Owned(buffer), DecodeOutcome::Decompressed),
        Err(e) => {
            tracing::warn!(
                compression = ?compression,
                len = bytes.len(),
                error = %e,
                "payload decompression failed, using raw bytes"
            );
            (Cow::Borrowed(bytes), DecodeOutcome::FallbackAfterError)
        }
    }
}

fn detect_compression(bytes: &[u8]) -> Option<Compression> {
    match bytes {
        [0x1f, 0x8b, ..] => Some(Compression::Gzip),
        // CMF 0x78 (deflate, 32K window) with a valid FCHECK
        [0x78, flg, ..] if ((0x78u16 << 8) | u16::from(*flg)) % 31 == 0 => Some(Compression::Zlib),
        _ => None,
    }
}

fn read_all<R: Read>(mut reader: R) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use std::io::Write;

    const JSON: &[u8] = br#"{"events":[]}"#;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_gzip_payload_is_inflated() {
        let compressed = gzip(JSON);
        let (decoded, outcome) = normalize_with_outcome(&compressed);
        assert_eq!(outcome, DecodeOutcome::Decompressed);
        assert_eq!(decoded.as_ref(), JSON);
    }

    #[test]
    fn test_zlib_payload_is_inflated() {
        let compressed = zlib(JSON);
        let (decoded, outcome) = normalize_with_outcome(&compressed);
        assert_eq!(outcome, DecodeOutcome::Decompressed);
        assert_eq!(decoded.as_ref(), JSON);
    }

    #[test]
    fn test_plain_json_passes_through() {
        let (decoded, outcome) = normalize_with_outcome(JSON);
        assert_eq!(outcome, DecodeOutcome::Passthrough);
        assert!(matches!(decoded, Cow::Borrowed(_)));
        assert_eq!(decoded.as_ref(), JSON);
    }

    #[test]
    fn test_truncated_gzip_falls_back_to_original_bytes() {
        let mut compressed = gzip(JSON);
        compressed.truncate(12);

        let (decoded, outcome) = normalize_with_outcome(&compressed);
        assert_eq!(outcome, DecodeOutcome::FallbackAfterError);
        assert_eq!(decoded.as_ref(), compressed.as_slice());
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(&[]).as_ref(), &[] as &[u8]);
    }
}
