//! Binary payload ⇄ text codec
//!
//! Payloads are persisted as data URLs carrying standard base64, the same
//! shape a browser `FileReader::readAsDataURL` produces.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;

use crate::errors::ClipError;

pub const DATA_URL_PREFIX: &str = "data:video/webm;base64,";

/// Encode a binary payload into its persisted text form
pub fn encode_payload(payload: &[u8]) -> String {
    let mut out = String::with_capacity(DATA_URL_PREFIX.len() + payload.len().div_ceil(3) * 4);
    out.push_str(DATA_URL_PREFIX);
    STANDARD.encode_string(payload, &mut out);
    out
}

/// Decode persisted text back into the binary payload.
///
/// Accepts any `data:` URL (the media type is ignored) or bare base64.
pub fn decode_payload(text: &str) -> Result<Bytes, ClipError> {
    let body = if text.starts_with("data:") {
        let (header, body) = text
            .split_once(',')
            .ok_or_else(|| ClipError::Codec("data URL has no payload separator".to_string()))?;
        if !header.ends_with(";base64") {
            return Err(ClipError::Codec(format!(
                "unsupported data URL encoding: {}",
                header
            )));
        }
        body
    } else {
        text
    };

    STANDARD
        .decode(body.trim())
        .map(Bytes::from)
        .map_err(|e| ClipError::Codec(format!("invalid base64 payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_produces_data_url() {
        let encoded = encode_payload(b"webm");
        assert_eq!(encoded, "data:video/webm;base64,d2VibQ==");
    }

    #[test]
    fn test_roundtrip_binary() {
        let payload: Vec<u8> = (0..=255u8).collect();
        let decoded = decode_payload(&encode_payload(&payload)).unwrap();
        assert_eq!(decoded.as_ref(), payload.as_slice());
    }

    #[test]
    fn test_empty_payload() {
        let encoded = encode_payload(&[]);
        assert_eq!(encoded, DATA_URL_PREFIX);
        assert!(decode_payload(&encoded).unwrap().is_empty());
    }

    #[test]
    fn test_accepts_bare_base64_and_other_media_types() {
        assert_eq!(decode_payload("d2VibQ==").unwrap().as_ref(), b"webm");
        assert_eq!(
            decode_payload("data:video/mp4;base64,d2VibQ==").unwrap().as_ref(),
            b"webm"
        );
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(
            decode_payload("data:video/webm;base64"),
            Err(ClipError::Codec(_))
        ));
        assert!(matches!(
            decode_payload("data:text/plain,hello"),
            Err(ClipError::Codec(_))
        ));
        assert!(matches!(decode_payload("not base64!!"), Err(ClipError::Codec(_))));
    }
}
