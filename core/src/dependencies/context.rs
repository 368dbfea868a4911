use crate::dependencies::provider::{Provider, ProviderKey};
use crate::dependencies::resolver;
use crate::dependencies::types::MarkerSet;
use crate::errors::DiError;
use crate::types::{DynValue, Values};
use crate::validation::TypeValidator;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
struct Substitution {
    // Holding the original keeps its allocation, and so its identity, alive.
    _original: Option<Provider>,
    replacement: Provider,
}

/// **RESOLUTION CONTEXT**
///
/// Immutable configuration of a root call: values injected by parameter name,
/// provider substitutions, the optional validator and the recognized marker
/// shapes. New contexts are derived from existing ones; nothing is mutated in
/// place, so a context can be shared freely between concurrent calls.
#[derive(Clone, Default)]
pub struct Context {
    values: Arc<HashMap<String, DynValue>>,
    substitutions: Arc<HashMap<ProviderKey, Substitution>>,
    validator: Option<Arc<dyn TypeValidator>>,
    markers: MarkerSet,
}

/// Changes applied by [`Context::derive`].
#[derive(Default)]
pub struct Overrides {
    values: Values,
    substitutions: Vec<(ProviderKey, Substitution)>,
    validator: Option<Option<Arc<dyn TypeValidator>>>,
    markers: Option<MarkerSet>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.values.insert(name, value);
        self
    }

    pub fn values(mut self, values: Values) -> Self {
        for (name, value) in values.into_map() {
            self.values.insert_dyn(name, value);
        }
        self
    }

    /// Invoke `replacement` wherever `original` is declared.
    pub fn substitute(mut self, original: &Provider, replacement: Provider) -> Self {
        self.substitutions.push((
            original.key(),
            Substitution {
                _original: Some(original.clone()),
                replacement,
            },
        ));
        self
    }

    /// Invoke `replacement` wherever a provider is inferred from type `T`,
    /// including types declared without a constructor.
    pub fn substitute_type<T: Any>(mut self, replacement: Provider) -> Self {
        self.substitutions.push((
            ProviderKey::of_type::<T>(),
            Substitution {
                _original: None,
                replacement,
            },
        ));
        self
    }

    pub fn validator(mut self, validator: impl TypeValidator + 'static) -> Self {
        self.validator = Some(Some(Arc::new(validator)));
        self
    }

    pub fn shared_validator(mut self, validator: Option<Arc<dyn TypeValidator>>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn clear_validator(mut self) -> Self {
        self.validator = Some(None);
        self
    }

    pub fn markers(mut self, markers: MarkerSet) -> Self {
        self.markers = Some(markers);
        self
    }
}

impl Context {
    /// Base context: no values, no substitutions, no validator, `Depends` only.
    pub fn empty() -> Self {
        Self::default()
    }

    /// New context with `overrides` applied on top of `self`. Map entries of
    /// the overrides win; the validator and marker set are replaced when given.
    pub fn derive(&self, overrides: Overrides) -> Self {
        let Overrides {
            values,
            substitutions,
            validator,
            markers,
        } = overrides;

        let values = if values.is_empty() {
            self.values.clone()
        } else {
            let mut merged = (*self.values).clone();
            merged.extend(values.into_map());
            Arc::new(merged)
        };
        let substitutions = if substitutions.is_empty() {
            self.substitutions.clone()
        } else {
            let mut merged = (*self.substitutions).clone();
            merged.extend(substitutions);
            Arc::new(merged)
        };

        Self {
            values,
            substitutions,
            validator: validator.unwrap_or_else(|| self.validator.clone()),
            markers: markers.unwrap_or_else(|| self.markers.clone()),
        }
    }

    pub fn with_values(&self, values: Values) -> Self {
        self.derive(Overrides::new().values(values))
    }

    pub fn with_value<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) -> Self {
        self.derive(Overrides::new().value(name, value))
    }

    pub fn with_substitution(&self, original: &Provider, replacement: Provider) -> Self {
        self.derive(Overrides::new().substitute(original, replacement))
    }

    pub fn with_validator(&self, validator: impl TypeValidator + 'static) -> Self {
        self.derive(Overrides::new().validator(validator))
    }

    pub fn with_markers(&self, markers: MarkerSet) -> Self {
        self.derive(Overrides::new().markers(markers))
    }

    pub fn value(&self, name: &str) -> Option<&DynValue> {
        self.values.get(name)
    }

    pub fn contains_value(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// The provider to invoke in place of `provider`, if one is registered.
    pub fn substitute(&self, provider: &Provider) -> Option<&Provider> {
        self.substitute_key(&provider.key())
    }

    pub(crate) fn substitute_key(&self, key: &ProviderKey) -> Option<&Provider> {
        self.substitutions
            .get(key)
            .map(|substitution| &substitution.replacement)
    }

    pub fn validator(&self) -> Option<&dyn TypeValidator> {
        self.validator.as_deref()
    }

    pub fn markers(&self) -> &MarkerSet {
        &self.markers
    }

    /// Resolves `target`'s parameters, invokes it and finalizes every acquired
    /// resource. `values` are merged into this context's values for this call
    /// only.
    pub async fn call(&self, target: &Provider, values: Values) -> Result<DynValue, DiError> {
        let context = self.with_values(values);
        resolver::run(&context, target, None).await
    }

    /// [`Context::call`] with the return value downcast to `T`.
    pub async fn call_as<T: Any + Send + Sync>(
        &self,
        target: &Provider,
        values: Values,
    ) -> Result<Arc<T>, DiError> {
        let value = self.call(target, values).await?;
        value.downcast::<T>().map_err(|_| DiError::ReturnType {
            callable: target.name().to_string(),
            expected: type_name::<T>(),
        })
    }

    /// [`Context::call`] bounded by `limit`. On timeout the resources acquired
    /// so far are still finalized before the timeout is reported.
    pub async fn call_with_timeout(
        &self,
        target: &Provider,
        values: Values,
        limit: Duration,
    ) -> Result<DynValue, DiError> {
        let context = self.with_values(values);
        resolver::run(&context, target, Some(limit)).await
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Context")
            .field("values", &names)
            .field("substitutions", &self.substitutions.len())
            .field("validator", &self.validator.is_some())
            .field("markers", &self.markers.names().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeInfo;
    use crate::validation::ValidationError;

    fn passthrough(_: &TypeInfo, value: DynValue) -> Result<DynValue, ValidationError> {
        Ok(value)
    }

    #[test]
    fn test_derive_never_mutates_base() {
        let base = Context::empty();
        let first = base.with_value("a", 1i64);
        let second = first.with_value("b", 2i64);

        assert!(second.contains_value("a"));
        assert!(second.contains_value("b"));
        assert!(first.contains_value("a"));
        assert!(!first.contains_value("b"));
        assert!(!base.contains_value("a"));
        assert!(!base.contains_value("b"));
    }

    #[test]
    fn test_override_wins_on_collision() {
        let base = Context::empty().with_value("a", 1i64);
        let derived = base.with_value("a", 9i64);

        assert_eq!(derived.value("a").and_then(|v| v.downcast_ref::<i64>()), Some(&9));
        assert_eq!(base.value("a").and_then(|v| v.downcast_ref::<i64>()), Some(&1));
    }

    #[test]
    fn test_substitution_is_identity_keyed() {
        let real = Provider::constant("real_db", "real".to_string());
        let lookalike = Provider::constant("real_db", "real".to_string());
        let mock = Provider::constant("mock_db", "mock".to_string());

        let ctx = Context::empty().with_substitution(&real, mock.clone());
        assert!(ctx.substitute(&real).unwrap().same_as(&mock));
        assert!(ctx.substitute(&lookalike).is_none());
        assert!(Context::empty().substitute(&real).is_none());
    }

    #[test]
    fn test_validator_inherited_replaced_and_cleared() {
        let with = Context::empty().with_validator(passthrough);
        assert!(with.with_value("x", 1u8).validator().is_some());
        assert!(with.derive(Overrides::new().clear_validator()).validator().is_none());
        assert!(Context::empty().validator().is_none());
    }

    #[test]
    fn test_markers_replace_or_inherit() {
        let extended = Context::empty().with_markers(MarkerSet::extended());
        let derived = extended.with_value("x", 1u8);
        assert_eq!(derived.markers().names().collect::<Vec<_>>(), vec!["Depends", "Security"]);
        assert_eq!(Context::empty().markers().names().collect::<Vec<_>>(), vec!["Depends"]);
    }

    #[test]
    fn test_unchanged_maps_are_shared() {
        let base = Context::empty().with_value("a", 1i64);
        let derived = base.derive(Overrides::new().markers(MarkerSet::extended()));
        assert!(Arc::ptr_eq(&base.values, &derived.values));
    }
}
