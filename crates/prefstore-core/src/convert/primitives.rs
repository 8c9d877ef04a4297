use super::{ConvertError, Storable, ValueKind};
use crate::charset::Charset;

/// Types whose canonical form is their `Display` text, parsed back with `FromStr`.
macro_rules! textual_storable {
    ($($ty:ty => $kind:expr),+ $(,)?) => {
        $(
            impl Storable for $ty {
                const KIND: ValueKind = $kind;

                fn encode(&self, charset: Charset) -> Result<Vec<u8>, ConvertError> {
                    charset.encode(&self.to_string())
                }

                fn decode(bytes: &[u8], charset: Charset) -> Result<Self, ConvertError> {
                    let text = charset.decode(bytes)?;
                    text.parse::<$ty>()
                        .map_err(|e| ConvertError::malformed(Self::KIND, format!("{text:?}: {e}")))
                }
            }
        )+
    };
}

textual_storable! {
    bool => ValueKind::Boolean,
    i32 => ValueKind::Int,
    i64 => ValueKind::Long,
    f32 => ValueKind::Float,
    f64 => ValueKind::Double,
}

impl Storable for String {
    const KIND: ValueKind = ValueKind::Text;

    fn encode(&self, charset: Charset) -> Result<Vec<u8>, ConvertError> {
        charset.encode(self)
    }

    fn decode(bytes: &[u8], charset: Charset) -> Result<Self, ConvertError> {
        charset.decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T: Storable + PartialEq + std::fmt::Debug>(value: T) {
        let bytes = value.encode(Charset::Utf8).expect("encode");
        let back = T::decode(&bytes, Charset::Utf8).expect("decode");
        assert_eq!(back, value);
    }

    #[test]
    fn numbers_use_decimal_text() {
        assert_eq!(42i32.encode(Charset::Utf8).expect("encode"), b"42");
        assert_eq!((-7i64).encode(Charset::Utf8).expect("encode"), b"-7");
        assert_eq!(true.encode(Charset::Utf8).expect("encode"), b"true");
    }

    #[test]
    fn representative_values_round_trip() {
        round_trip(true);
        round_trip(false);
        round_trip(i32::MIN);
        round_trip(i64::MAX);
        round_trip(0.1f32);
        round_trip(std::f64::consts::PI);
        round_trip(f64::INFINITY);
        round_trip(String::new());
        round_trip("\u{1F389}".to_string());
    }

    #[test]
    fn non_numeric_text_is_malformed() {
        let err = i32::decode(b"y", Charset::Utf8).expect_err("should fail");
        assert!(matches!(
            err,
            ConvertError::Malformed {
                kind: ValueKind::Int,
                ..
            }
        ));
    }

    #[test]
    fn long_text_overflows_int() {
        let bytes = i64::MAX.encode(Charset::Utf8).expect("encode");
        assert!(i32::decode(&bytes, Charset::Utf8).is_err());
    }
}
