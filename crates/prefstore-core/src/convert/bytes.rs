use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::{ConvertError, Storable, ValueKind};
use crate::charset::Charset;

// Raw bytes are stored as base64 text so plaintext payloads stay text-safe.
impl Storable for Vec<u8> {
    const KIND: ValueKind = ValueKind::Bytes;

    fn encode(&self, charset: Charset) -> Result<Vec<u8>, ConvertError> {
        charset.encode(&STANDARD.encode(self))
    }

    fn decode(bytes: &[u8], charset: Charset) -> Result<Self, ConvertError> {
        let text = charset.decode(bytes)?;
        STANDARD
            .decode(text.as_bytes())
            .map_err(|e| ConvertError::malformed(Self::KIND, e))
    }
}
