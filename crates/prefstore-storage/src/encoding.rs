use base64::{
    engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD},
    DecodeError, Engine as _,
};
use serde::{Deserialize, Serialize};

/// Text encoding applied to engine output before it reaches the medium.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Base64Variant {
    #[default]
    Standard,
    StandardNoPad,
    UrlSafe,
    UrlSafeNoPad,
}

impl Base64Variant {
    pub fn encode(self, input: &[u8]) -> Vec<u8> {
        let text = match self {
            Base64Variant::Standard => STANDARD.encode(input),
            Base64Variant::StandardNoPad => STANDARD_NO_PAD.encode(input),
            Base64Variant::UrlSafe => URL_SAFE.encode(input),
            Base64Variant::UrlSafeNoPad => URL_SAFE_NO_PAD.encode(input),
        };
        text.into_bytes()
    }

    pub fn decode(self, input: &[u8]) -> Result<Vec<u8>, DecodeError> {
        match self {
            Base64Variant::Standard => STANDARD.decode(input),
            Base64Variant::StandardNoPad => STANDARD_NO_PAD.decode(input),
            Base64Variant::UrlSafe => URL_SAFE.decode(input),
            Base64Variant::UrlSafeNoPad => URL_SAFE_NO_PAD.decode(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_safe_no_pad_avoids_reserved_characters() {
        let bytes = [0xFBu8, 0xFF, 0xBF, 0x01];
        let encoded = Base64Variant::UrlSafeNoPad.encode(&bytes);
        let text = String::from_utf8(encoded.clone()).expect("ascii");
        assert!(!text.contains('+') && !text.contains('/') && !text.contains('='));
        assert_eq!(Base64Variant::UrlSafeNoPad.decode(&encoded).expect("decode"), bytes);
    }

    #[test]
    fn standard_rejects_garbage() {
        assert!(Base64Variant::Standard.decode(b"not base64!").is_err());
    }
}
