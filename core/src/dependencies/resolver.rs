use crate::dependencies::cleanup;
use crate::dependencies::context::Context;
use crate::dependencies::provider::{Arguments, Outcome, Provider, ProviderKey};
use crate::dependencies::scope::ResolutionScope;
use crate::dependencies::signature::{self, DefaultKind, ParameterDescriptor};
use crate::errors::{panic_message, ChainedFinalizationError, DiError};
use crate::types::{DynValue, TypeInfo};
use crate::validation::{error_codes, ValidationError};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

/// Runs one root call: resolve and invoke `target` in a fresh scope, then
/// finalize whatever was acquired, whether or not resolution succeeded.
pub(crate) async fn run(
    context: &Context,
    target: &Provider,
    limit: Option<Duration>,
) -> Result<DynValue, DiError> {
    log::debug!("resolving `{}`", target.name());
    let mut scope = ResolutionScope::new(context);
    let resolver = DependencyResolver::new(context);

    let outcome = match limit {
        None => resolver.resolve(target, true, &mut scope).await,
        Some(limit) => {
            match tokio::time::timeout(limit, resolver.resolve(target, true, &mut scope)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(DiError::Timeout {
                    callable: target.name().to_string(),
                    timeout: limit,
                }),
            }
        }
    };

    let finalized = cleanup::finalize(&mut scope).await;
    settle(outcome, finalized)
}

fn settle(
    outcome: Result<DynValue, DiError>,
    finalized: Result<(), ChainedFinalizationError>,
) -> Result<DynValue, DiError> {
    match (outcome, finalized) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(chain)) => Err(DiError::Finalization(chain)),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(chain)) => Err(DiError::Unwound {
            primary: Box::new(err),
            finalization: chain,
        }),
    }
}

pub(crate) struct DependencyResolver<'c> {
    context: &'c Context,
}

impl<'c> DependencyResolver<'c> {
    pub(crate) fn new(context: &'c Context) -> Self {
        Self { context }
    }

    /// Value of `provider` within `scope`.
    ///
    /// Cache and cycle bookkeeping use the declared provider's identity even
    /// when a substitute is invoked in its place.
    pub(crate) fn resolve<'a>(
        &'a self,
        provider: &'a Provider,
        use_cache: bool,
        scope: &'a mut ResolutionScope,
    ) -> BoxFuture<'a, Result<DynValue, DiError>> {
        let target = self.context.substitute(provider).unwrap_or(provider);
        self.resolve_as(provider.key(), provider.name(), target, use_cache, scope)
    }

    /// Invokes `target` under the identity `key`, reported as `declared` in
    /// cycle errors.
    fn resolve_as<'a>(
        &'a self,
        key: ProviderKey,
        declared: &'a str,
        target: &'a Provider,
        use_cache: bool,
        scope: &'a mut ResolutionScope,
    ) -> BoxFuture<'a, Result<DynValue, DiError>> {
        Box::pin(async move {
            if use_cache {
                if let Some(value) = scope.cached(&key) {
                    log::trace!("cache hit for `{declared}`");
                    return Ok(value);
                }
            }
            if !scope.enter(key) {
                return Err(DiError::CircularDependency {
                    callable: declared.to_string(),
                });
            }

            let outcome = self.invoke(target, scope).await;
            scope.leave(&key);

            let value = outcome?;
            if use_cache {
                scope.store(key, value.clone());
            }
            Ok(value)
        })
    }

    async fn invoke(&self, target: &Provider, scope: &mut ResolutionScope) -> Result<DynValue, DiError> {
        let descriptors = signature::describe(target, self.context.markers())?;
        let mut args = Arguments::with_capacity(descriptors.len());
        for param in &descriptors {
            let value = self.resolve_argument(target, param, scope).await?;
            args.push(param.name.clone(), value);
        }

        let callable = target.name();
        let outcome = match std::panic::catch_unwind(AssertUnwindSafe(|| target.invoke(args))) {
            Ok(pending) => AssertUnwindSafe(pending)
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(panic_message(payload).into())),
            Err(payload) => Err(panic_message(payload).into()),
        }
        .map_err(|source| DiError::Invocation {
            callable: callable.to_string(),
            source,
        })?;

        match outcome {
            Outcome::Value(value) => Ok(value),
            Outcome::Resource(resource) => {
                let (value, finalizer) = resource.into_parts();
                log::debug!("acquired resource from `{callable}`");
                scope.register_cleanup(callable, finalizer);
                Ok(value)
            }
        }
    }

    async fn resolve_argument(
        &self,
        owner: &Provider,
        param: &ParameterDescriptor,
        scope: &mut ResolutionScope,
    ) -> Result<DynValue, DiError> {
        log::trace!("resolving `{}` of `{}`", param.name, owner.name());
        let candidate = match &param.default {
            DefaultKind::Dependency(marker) => match marker.dependency() {
                Some(dependency) => self.resolve(dependency, marker.use_cache(), scope).await?,
                None => {
                    self.resolve_inferred(owner, param, marker.use_cache(), scope)
                        .await?
                }
            },
            DefaultKind::Constant(default) => match self.context.value(&param.name) {
                Some(value) => value.clone(),
                None => default.clone(),
            },
            DefaultKind::None => match self.context.value(&param.name) {
                Some(value) => value.clone(),
                None => {
                    return Err(DiError::MissingValue {
                        parameter: param.name.clone(),
                        callable: owner.name().to_string(),
                    })
                }
            },
        };

        let (Some(validator), Some(declared)) = (self.context.validator(), &param.declared) else {
            return Ok(candidate);
        };
        std::panic::catch_unwind(AssertUnwindSafe(|| validator.validate(declared, candidate)))
            .unwrap_or_else(|payload| {
                Err(ValidationError::new(
                    error_codes::VALIDATOR_PANICKED,
                    panic_message(payload),
                ))
            })
            .map_err(|source| DiError::Validation {
                parameter: param.name.clone(),
                callable: owner.name().to_string(),
                source,
            })
    }

    /// Marker without a provider: a substitute registered for the declared
    /// type, or else the type's zero-argument constructor, keyed by the type.
    async fn resolve_inferred(
        &self,
        owner: &Provider,
        param: &ParameterDescriptor,
        use_cache: bool,
        scope: &mut ResolutionScope,
    ) -> Result<DynValue, DiError> {
        let invalid = |reason: String| DiError::InvalidDependency {
            parameter: param.name.clone(),
            callable: owner.name().to_string(),
            reason,
        };

        let declared: &TypeInfo = param
            .declared
            .as_ref()
            .ok_or_else(|| invalid("no provider given and no declared type".to_string()))?;
        let key = declared.key();
        if use_cache {
            if let Some(value) = scope.cached(&key) {
                return Ok(value);
            }
        }

        let target = match self.context.substitute_key(&key) {
            Some(substitute) => substitute,
            None => {
                let constructor = declared
                    .constructor()
                    .ok_or_else(|| invalid(format!("`{}` is not constructible", declared.name())))?;
                let takes_arguments = signature::declared_parameters(constructor)?
                    .map_or(true, |params| !params.is_empty());
                if takes_arguments {
                    return Err(invalid(format!(
                        "constructor of `{}` takes arguments",
                        declared.name()
                    )));
                }
                constructor
            }
        };

        self.resolve_as(key, declared.name(), target, use_cache, scope)
            .await
    }
}
