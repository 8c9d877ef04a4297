use serde::{de::DeserializeOwned, Serialize};

use super::{ConvertError, Storable, ValueKind};
use crate::charset::Charset;

impl Storable for serde_json::Value {
    const KIND: ValueKind = ValueKind::Structured;

    fn encode(&self, charset: Charset) -> Result<Vec<u8>, ConvertError> {
        charset.encode(&self.to_string())
    }

    fn decode(bytes: &[u8], charset: Charset) -> Result<Self, ConvertError> {
        let text = charset.decode(bytes)?;
        serde_json::from_str(&text).map_err(|e| ConvertError::malformed(Self::KIND, e))
    }
}

/// Stores any serde type as its compact JSON document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Storable for Json<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    const KIND: ValueKind = ValueKind::Structured;

    fn encode(&self, charset: Charset) -> Result<Vec<u8>, ConvertError> {
        let text = serde_json::to_string(&self.0).map_err(|e| ConvertError::malformed(Self::KIND, e))?;
        charset.encode(&text)
    }

    fn decode(bytes: &[u8], charset: Charset) -> Result<Self, ConvertError> {
        let text = charset.decode(bytes)?;
        serde_json::from_str(&text)
            .map(Json)
            .map_err(|e| ConvertError::malformed(Self::KIND, e))
    }
}
