// Base64 transport for binary data inside text containers

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine as _;

use crate::error::{Result, TagError};

/// Encode bytes as standard padded base64
pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode standard base64, tolerating missing padding and embedded line breaks
pub fn decode(text: &str) -> Result<Vec<u8>> {
    let cleaned: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if cleaned.len() % 4 == 1 {
        return Err(TagError::corrupt("base64 input has an impossible length"));
    }
    STANDARD
        .decode(cleaned.as_bytes())
        .or_else(|_| STANDARD_NO_PAD.decode(cleaned.trim_end_matches('=').as_bytes()))
        .map_err(|e| TagError::corrupt(format!("invalid base64: {e}")))
}

/// Serde adapter storing byte buffers as base64 strings
pub mod serde_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::decode(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        assert_eq!(encode(b"hello"), "aGVsbG8=");
        assert_eq!(decode("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode("aGVs\nbG8").unwrap(), b"hello");
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(decode("a").is_err());
        assert!(decode("!!!!").is_err());
        assert!(decode("aGVsbG8=aGVs").is_err());
    }
}
