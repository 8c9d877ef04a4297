/// The value threaded between the converter and the crypto engine.
///
/// `iv` is only populated by engines that need an explicit per-message
/// initialization vector; the orchestrator persists it next to the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transmission {
    pub payload: Vec<u8>,
    pub iv: Option<Vec<u8>>,
}

impl Transmission {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            iv: None,
        }
    }

    pub fn with_iv(payload: impl Into<Vec<u8>>, iv: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            iv: Some(iv.into()),
        }
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}
