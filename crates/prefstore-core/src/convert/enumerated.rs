use super::{ConvertError, Storable, ValueKind};
use crate::charset::Charset;

/// Enumerations that can be stored by variant name.
pub trait EnumValue: Sized + Send + Sync + 'static {
    fn variant_name(&self) -> &'static str;

    fn from_variant_name(name: &str) -> Option<Self>;
}

/// Wrapper storing an [`EnumValue`] as its variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Enumerated<E>(pub E);

impl<E> Enumerated<E> {
    pub fn into_inner(self) -> E {
        self.0
    }
}

impl<E: EnumValue> Storable for Enumerated<E> {
    const KIND: ValueKind = ValueKind::Enumerated;

    fn encode(&self, charset: Charset) -> Result<Vec<u8>, ConvertError> {
        charset.encode(self.0.variant_name())
    }

    fn decode(bytes: &[u8], charset: Charset) -> Result<Self, ConvertError> {
        let name = charset.decode(bytes)?;
        E::from_variant_name(&name)
            .map(Enumerated)
            .ok_or_else(|| ConvertError::malformed(Self::KIND, format!("unknown variant {name:?}")))
    }
}
