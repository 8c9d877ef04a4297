use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
    marker::PhantomData,
    sync::Arc,
};

use super::{ConvertError, Storable, TypeConverter};
use crate::charset::Charset;

/// Converter that delegates to the type's `Storable` implementation.
pub struct DefaultConverter<T>(PhantomData<fn() -> T>);

impl<T> DefaultConverter<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for DefaultConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Storable> TypeConverter<T> for DefaultConverter<T> {
    fn encode(&self, value: &T, charset: Charset) -> Result<Vec<u8>, ConvertError> {
        value.encode(charset)
    }

    fn decode(&self, bytes: &[u8], charset: Charset) -> Result<T, ConvertError> {
        T::decode(bytes, charset)
    }
}

/// Per-type custom converters, keyed by `TypeId`.
///
/// Each slot stores an `Arc<dyn TypeConverter<T>>` erased to `dyn Any`, so
/// the downcast in [`ConverterRegistry::resolve`] can only ever see the
/// converter registered for that exact `T`.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    custom: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the representation of `T` for every subsequent push and pull.
    pub fn register<T, C>(&mut self, converter: C)
    where
        T: Storable,
        C: TypeConverter<T> + 'static,
    {
        let erased: Arc<dyn TypeConverter<T>> = Arc::new(converter);
        self.custom.insert(TypeId::of::<T>(), Arc::new(erased));
    }

    pub fn has_custom<T: Storable>(&self) -> bool {
        self.custom.contains_key(&TypeId::of::<T>())
    }

    /// Custom converter for `T` if one was registered, the default otherwise.
    pub fn resolve<T: Storable>(&self) -> Arc<dyn TypeConverter<T>> {
        self.custom
            .get(&TypeId::of::<T>())
            .and_then(|slot| slot.downcast_ref::<Arc<dyn TypeConverter<T>>>())
            .cloned()
            .unwrap_or_else(|| Arc::new(DefaultConverter::<T>::new()) as Arc<dyn TypeConverter<T>>)
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("custom", &self.custom.len())
            .finish()
    }
}
