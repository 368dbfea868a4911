//! # TINY-DI TYPE DEFINITIONS
//!
//! Shared value containers passed between the context, the resolver and
//! user-supplied providers.

use crate::dependencies::{Provider, ProviderKey};
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// **TYPE-ERASED VALUE**
///
/// Every injected argument, cached dependency and return value travels as one
/// of these. Cloning only bumps the reference count.
pub type DynValue = Arc<dyn Any + Send + Sync>;

/// Failure raised by user code (provider bodies, finalizers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// **DECLARED PARAMETER TYPE**
///
/// Runtime description of a parameter's declared type. Used by the validator
/// capability and, for markers without an explicit callable, to infer the
/// provider from the type's zero-argument constructor.
#[derive(Clone)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
    accepts: fn(&(dyn Any + Send + Sync)) -> bool,
    constructor: Option<Provider>,
}

impl TypeInfo {
    /// Type description without a constructor.
    pub fn of<T: Any + Send + Sync>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            accepts: |value: &(dyn Any + Send + Sync)| value.is::<T>(),
            constructor: None,
        }
    }

    /// Type description whose constructor is `T::default()`.
    pub fn constructible<T: Default + Any + Send + Sync>() -> Self {
        Self::of::<T>().with_constructor(Provider::for_default::<T>())
    }

    /// Attaches a custom constructor. The provider is re-keyed by the type so
    /// every parameter declaring `T` shares one cache entry.
    pub fn with_constructor(mut self, constructor: Provider) -> Self {
        self.constructor = Some(constructor.rekeyed(ProviderKey::Type(self.id)));
        self
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn constructor(&self) -> Option<&Provider> {
        self.constructor.as_ref()
    }

    /// Whether `value` is an instance of the declared type.
    pub fn accepts(&self, value: &(dyn Any + Send + Sync)) -> bool {
        (self.accepts)(value)
    }

    pub(crate) fn key(&self) -> ProviderKey {
        ProviderKey::Type(self.id)
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("constructible", &self.constructor.is_some())
            .finish()
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// **NAMED VALUES**
///
/// Values injected by parameter name, either as part of a context or as the
/// extra values of a single root call.
#[derive(Clone, Default)]
pub struct Values(HashMap<String, DynValue>);

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.0.insert(name.into(), Arc::new(value));
    }

    /// Inserts an already erased value without wrapping it again.
    pub fn insert_dyn(&mut self, name: impl Into<String>, value: DynValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&DynValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub(crate) fn into_map(self) -> HashMap<String, DynValue> {
        self.0
    }
}

impl fmt::Debug for Values {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_tuple("Values").field(&names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Service;

    #[test]
    fn test_type_info_accepts_matching_values() {
        let info = TypeInfo::of::<i64>();
        let value: DynValue = Arc::new(5i64);
        let other: DynValue = Arc::new("five".to_string());

        assert!(info.accepts(value.as_ref()));
        assert!(!info.accepts(other.as_ref()));
        assert!(info.constructor().is_none());
    }

    #[test]
    fn test_constructible_type_is_keyed_by_type() {
        let info = TypeInfo::constructible::<Service>();
        let constructor = info.constructor().expect("constructor attached");

        assert_eq!(constructor.key(), ProviderKey::Type(TypeId::of::<Service>()));
        assert_eq!(TypeInfo::constructible::<Service>(), info);
    }

    #[test]
    fn test_values_builder() {
        let values = Values::new().with("a", 1i64).with("b", "two".to_string());

        assert_eq!(values.len(), 2);
        assert!(values.contains("a"));
        assert_eq!(
            values.get("b").and_then(|v| v.downcast_ref::<String>()),
            Some(&"two".to_string())
        );
        assert_eq!(format!("{values:?}"), r#"Values(["a", "b"])"#);
    }
}
