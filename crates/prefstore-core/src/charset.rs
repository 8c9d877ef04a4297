use serde::{Deserialize, Serialize};

use crate::convert::ConvertError;

/// Character encoding used whenever a converter turns text into bytes.
///
/// Passed explicitly down the pipeline; `Charset::default()` (UTF-8) is the
/// fallback for callers that decode outside a configured store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Charset {
    #[default]
    Utf8,
    /// ISO-8859-1: one byte per code point, U+0000..=U+00FF only.
    Latin1,
}

impl Charset {
    pub fn name(self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Latin1 => "ISO-8859-1",
        }
    }

    pub fn encode(self, text: &str) -> Result<Vec<u8>, ConvertError> {
        match self {
            Charset::Utf8 => Ok(text.as_bytes().to_vec()),
            Charset::Latin1 => text
                .chars()
                .map(|c| {
                    u8::try_from(u32::from(c)).map_err(|_| ConvertError::Charset {
                        charset: self.name(),
                        reason: format!("unmappable character {c:?}"),
                    })
                })
                .collect(),
        }
    }

    pub fn decode(self, bytes: &[u8]) -> Result<String, ConvertError> {
        match self {
            Charset::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| ConvertError::Charset {
                charset: self.name(),
                reason: e.to_string(),
            }),
            Charset::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_round_trips_non_ascii() {
        let text = "\u{1F389} party";
        let bytes = Charset::Utf8.encode(text).expect("encode");
        assert_eq!(Charset::Utf8.decode(&bytes).expect("decode"), text);
    }

    #[test]
    fn latin1_uses_one_byte_per_char() {
        let bytes = Charset::Latin1.encode("café").expect("encode");
        assert_eq!(bytes, vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(Charset::Latin1.decode(&bytes).expect("decode"), "café");
    }

    #[test]
    fn latin1_rejects_wide_characters() {
        let err = Charset::Latin1.encode("\u{1F389}").expect_err("should reject");
        assert!(matches!(err, ConvertError::Charset { .. }));
    }

    #[test]
    fn utf8_rejects_invalid_sequences() {
        let err = Charset::Utf8.decode(&[0xFF, 0xFE]).expect_err("should reject");
        assert!(matches!(err, ConvertError::Charset { .. }));
    }
}
