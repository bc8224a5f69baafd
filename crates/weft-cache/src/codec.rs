//! Cache payload encoding.
//!
//! Values are serialized as JSON. Payloads larger than the compression
//! threshold are gzip-compressed. The first byte of every payload records
//! which form follows, so reads never need to guess.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use weft_core::{Error, Result};

/// Header byte: plain JSON follows.
pub const FORMAT_JSON: u8 = 0;

/// Header byte: gzip-compressed JSON follows.
pub const FORMAT_GZIP: u8 = 1;

/// An encoded payload ready for a backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Encoded {
    /// Header byte plus body.
    pub bytes: Vec<u8>,
    /// Whether the body is compressed.
    pub compressed: bool,
}

/// Serialize `value`, compressing when the JSON exceeds `threshold` bytes.
pub fn encode<T: Serialize + ?Sized>(value: &T, threshold: usize) -> Result<Encoded> {
    let json = serde_json::to_vec(value)?;

    if json.len() <= threshold {
        let mut bytes = Vec::with_capacity(json.len() + 1);
        bytes.push(FORMAT_JSON);
        bytes.extend_from_slice(&json);
        return Ok(Encoded {
            bytes,
            compressed: false,
        });
    }

    let mut encoder = GzEncoder::new(vec![FORMAT_GZIP], Compression::fast());
    encoder
        .write_all(&json)
        .map_err(|e| Error::cache(format!("gzip encode failed: {e}")))?;
    let bytes = encoder
        .finish()
        .map_err(|e| Error::cache(format!("gzip encode failed: {e}")))?;

    log::trace!("Compressed cache payload {} -> {} bytes", json.len(), bytes.len());
    Ok(Encoded {
        bytes,
        compressed: true,
    })
}

/// Decode a payload produced by [`encode`].
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    let (format, body) = payload
        .split_first()
        .ok_or_else(|| Error::cache("empty cache payload"))?;

    match *format {
        FORMAT_JSON => Ok(serde_json::from_slice(body)?),
        FORMAT_GZIP => {
            let mut json = Vec::new();
            GzDecoder::new(body)
                .read_to_end(&mut json)
                .map_err(|e| Error::cache(format!("gzip decode failed: {e}")))?;
            Ok(serde_json::from_slice(&json)?)
        }
        other => Err(Error::cache(format!("unknown cache payload format {other}"))),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_small_payload_is_plain() {
        let encoded = encode(&vec!["a", "b"], 1024).unwrap();
        assert!(!encoded.compressed);
        assert_eq!(encoded.bytes[0], FORMAT_JSON);
        assert_eq!(&encoded.bytes[1..], br#"["a","b"]"#);
    }

    #[test]
    fn test_large_payload_is_compressed_and_restored() {
        let value: Vec<String> = (0..200).map(|i| format!("result-{i}")).collect();
        let encoded = encode(&value, 1024).unwrap();
        assert!(encoded.compressed);
        assert_eq!(encoded.bytes[0], FORMAT_GZIP);
        assert!(encoded.bytes.len() < serde_json::to_vec(&value).unwrap().len());

        let decoded: Vec<String> = decode(&encoded.bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_threshold_boundary() {
        let json_len = serde_json::to_vec("abc").unwrap().len();
        assert!(!encode("abc", json_len).unwrap().compressed);
        assert!(encode("abc", json_len - 1).unwrap().compressed);
    }

    #[test]
    fn test_decode_rejects_bad_payloads() {
        assert!(matches!(
            decode::<String>(&[]).unwrap_err(),
            Error::CacheBackend(_)
        ));
        assert!(matches!(
            decode::<String>(&[9, b'1']).unwrap_err(),
            Error::CacheBackend(_)
        ));
        assert!(matches!(
            decode::<String>(&[FORMAT_JSON, b'{']).unwrap_err(),
            Error::Serialization(_)
        ));
        assert!(decode::<String>(&[FORMAT_GZIP, 1, 2, 3]).is_err());
    }
}
