pub use crate::config::EngineConfig;
pub use crate::dependencies::{
    Arguments, Context, Depends, Marker, MarkerSet, Overrides, Parameter, Provider, Resource,
    Security,
};
pub use crate::errors::{ChainedFinalizationError, DiError};
pub use crate::types::{BoxError, DynValue, TypeInfo, Values};
pub use crate::validation::{RuleValidator, TypeValidator, ValidationError};

use std::sync::Arc;

/// **ROOT CALL**
///
/// Resolves every parameter of `target` within a fresh scope, invokes it and
/// finalizes the resources acquired on the way. `extra_values` apply to this
/// call only and take precedence over the context's values.
pub async fn resolve_and_call(
    target: &Provider,
    context: &Context,
    extra_values: Values,
) -> Result<DynValue, DiError> {
    context.call(target, extra_values).await
}

/// New context layered over `base`.
///
/// `validator` replaces the inherited validator when `Some`; `None` keeps it.
pub fn derive_context(
    base: &Context,
    values: Values,
    substitutions: impl IntoIterator<Item = (Provider, Provider)>,
    validator: Option<Arc<dyn TypeValidator>>,
) -> Context {
    let mut overrides = Overrides::new().values(values);
    for (original, replacement) in substitutions {
        overrides = overrides.substitute(&original, replacement);
    }
    if validator.is_some() {
        overrides = overrides.shared_validator(validator);
    }
    base.derive(overrides)
}

/// `Depends` marker on `dependency`; `None` infers the provider from the
/// parameter's declared type.
pub fn make_dependency_marker(dependency: Option<&Provider>, use_cache: bool) -> Depends {
    Depends::new(dependency.cloned(), use_cache)
}
