//! Text-only transport encoding for result tables and other payloads.
//!
//! `bincode` → gzip → lowercase hex, behind a version prefix. Floats survive
//! bit for bit, which a JSON round trip does not guarantee for NaN or
//! infinities.

use std::fmt::Write as _;
use std::io::{Read, Write};

use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

pub const TRANSPORT_PREFIX: &str = "fcst1:";

#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("Failed to encode payload: {0}")]
    Encode(#[source] bincode::Error),

    #[error("Failed to decode payload: {0}")]
    Decode(#[source] bincode::Error),

    #[error("Compression failed: {0}")]
    Compression(#[source] std::io::Error),

    #[error("Payload is not valid compressed data: {0}")]
    Decompression(#[source] std::io::Error),

    #[error("Payload does not start with '{TRANSPORT_PREFIX}'")]
    MissingPrefix,

    #[error("Invalid hex digit at offset {offset}")]
    InvalidHex { offset: usize },

    #[error("Payload has odd length {0}")]
    OddLength(usize),
}

pub fn to_transport<T: Serialize + ?Sized>(value: &T) -> Result<String, SerializationError> {
    let encoded = bincode::serialize(value).map_err(SerializationError::Encode)?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder
        .write_all(&encoded)
        .map_err(SerializationError::Compression)?;
    let compressed = encoder.finish().map_err(SerializationError::Compression)?;

    let mut text = String::with_capacity(TRANSPORT_PREFIX.len() + 2 * compressed.len());
    text.push_str(TRANSPORT_PREFIX);
    for byte in compressed {
        let _ = write!(text, "{:02x}", byte);
    }
    Ok(text)
}

pub fn from_transport<T: DeserializeOwned>(text: &str) -> Result<T, SerializationError> {
    let hex = text
        .trim()
        .strip_prefix(TRANSPORT_PREFIX)
        .ok_or(SerializationError::MissingPrefix)?;
    let compressed = decode_hex(hex)?;

    let mut encoded = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut encoded)
        .map_err(SerializationError::Decompression)?;

    bincode::deserialize(&encoded).map_err(SerializationError::Decode)
}

/// `None` passes through untouched.
pub fn to_transport_opt<T: Serialize>(
    value: Option<&T>,
) -> Result<Option<String>, SerializationError> {
    value.map(to_transport).transpose()
}

/// `None` passes through untouched.
pub fn from_transport_opt<T: DeserializeOwned>(
    text: Option<&str>,
) -> Result<Option<T>, SerializationError> {
    text.map(from_transport).transpose()
}

fn decode_hex(hex: &str) -> Result<Vec<u8>, SerializationError> {
    let bytes = hex.as_bytes();
    if bytes.len() % 2 != 0 {
        return Err(SerializationError::OddLength(bytes.len()));
    }
    let nibble = |offset: usize| -> Result<u8, SerializationError> {
        match bytes[offset] {
            b @ b'0'..=b'9' => Ok(b - b'0'),
            b @ b'a'..=b'f' => Ok(b - b'a' + 10),
            b @ b'A'..=b'F' => Ok(b - b'A' + 10),
            _ => Err(SerializationError::InvalidHex { offset }),
        }
    };
    (0..bytes.len())
        .step_by(2)
        .map(|i| Ok(nibble(i)? << 4 | nibble(i + 1)?))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_required() {
        let err = from_transport::<Vec<f64>>("deadbeef").unwrap_err();
        assert!(matches!(err, SerializationError::MissingPrefix));
    }

    #[test]
    fn bad_hex_is_reported() {
        let err = from_transport::<Vec<f64>>("fcst1:zz").unwrap_err();
        assert!(matches!(err, SerializationError::InvalidHex { offset: 0 }));
        let err = from_transport::<Vec<f64>>("fcst1:abc").unwrap_err();
        assert!(matches!(err, SerializationError::OddLength(3)));
    }

    #[test]
    fn truncated_payload_fails() {
        let text = to_transport(&vec![1.0_f64; 64]).unwrap();
        let cut = &text[..text.len() - 10];
        assert!(from_transport::<Vec<f64>>(cut).is_err());
    }

    #[test]
    fn special_floats_survive() {
        let values = vec![f64::NAN, f64::INFINITY, -0.0, 1e-310, 0.1 + 0.2];
        let back: Vec<f64> = from_transport(&to_transport(&values).unwrap()).unwrap();
        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&back), bits(&values));
    }

    #[test]
    fn optional_helpers_pass_none_through() {
        assert_eq!(to_transport_opt::<Vec<f64>>(None).unwrap(), None);
        assert_eq!(from_transport_opt::<Vec<f64>>(None).unwrap(), None);
    }
}
