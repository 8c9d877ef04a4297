use num_bigint::BigInt;

use super::{ConvertError, Storable, ValueKind};
use crate::charset::Charset;

impl Storable for BigInt {
    const KIND: ValueKind = ValueKind::BigInteger;

    fn encode(&self, charset: Charset) -> Result<Vec<u8>, ConvertError> {
        charset.encode(&self.to_str_radix(10))
    }

    fn decode(bytes: &[u8], charset: Charset) -> Result<Self, ConvertError> {
        let text = charset.decode(bytes)?;
        BigInt::parse_bytes(text.as_bytes(), 10)
            .ok_or_else(|| ConvertError::malformed(Self::KIND, format!("{text:?} is not base-10")))
    }
}
