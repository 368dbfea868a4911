use crate::dependencies::types::Parameter;
use crate::errors::DiError;
use crate::types::{BoxError, DynValue};
use futures::future::BoxFuture;
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Identity of a callable for caching, cycle detection and substitution.
///
/// `Instance` is the address of the provider's shared allocation, so two
/// providers built from the same closure are still distinct. `Type` keys
/// providers inferred from a declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKey {
    Instance(usize),
    Type(TypeId),
}

impl ProviderKey {
    pub fn of_type<T: Any>() -> Self {
        ProviderKey::Type(TypeId::of::<T>())
    }
}

/// What invoking a provider produced.
pub enum Outcome {
    Value(DynValue),
    /// A value that must be finalized once the root call is over.
    Resource(Resource),
}

pub(crate) type Finalizer = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), BoxError>> + Send>;

/// An acquired value plus the teardown that releases it.
///
/// A resource carries exactly one value; the finalizer runs once, after the
/// root call finished, in reverse acquisition order.
pub struct Resource {
    value: DynValue,
    finalizer: Finalizer,
}

impl Resource {
    pub fn new<T, F, Fut>(value: T, finalizer: F) -> Self
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            value: Arc::new(value),
            finalizer: Box::new(move || -> BoxFuture<'static, Result<(), BoxError>> {
                Box::pin(finalizer())
            }),
        }
    }

    /// Resource whose teardown is synchronous.
    pub fn with_cleanup<T, F>(value: T, cleanup: F) -> Self
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        Self::new(value, move || async move { cleanup() })
    }

    pub(crate) fn into_parts(self) -> (DynValue, Finalizer) {
        (self.value, self.finalizer)
    }
}

/// A callable the resolver can inspect and invoke.
///
/// Most code builds providers with [`Provider::builder`]; implement this trait
/// directly to plug in callables with a hand-written signature.
pub trait Injectable: Send + Sync {
    fn name(&self) -> &str;

    /// Declared parameters in call order, or `None` when the callable has no
    /// signature that can be inspected.
    fn parameters(&self) -> Option<&[Parameter]>;

    fn invoke(&self, args: Arguments) -> BoxFuture<'static, Result<Outcome, BoxError>>;
}

/// Shared handle to an [`Injectable`] together with its identity.
#[derive(Clone)]
pub struct Provider {
    key: ProviderKey,
    inner: Arc<dyn Injectable>,
}

impl Provider {
    pub fn new<I: Injectable + 'static>(inner: I) -> Self {
        Self::from_arc(Arc::new(inner))
    }

    pub fn from_arc(inner: Arc<dyn Injectable>) -> Self {
        let key = ProviderKey::Instance(Arc::as_ptr(&inner) as *const () as usize);
        Self { key, inner }
    }

    pub fn builder(name: impl Into<String>) -> ProviderBuilder {
        ProviderBuilder {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Zero-argument provider that always yields `value`.
    pub fn constant<T: Any + Send + Sync>(name: impl Into<String>, value: T) -> Self {
        let value: DynValue = Arc::new(value);
        Self::builder(name).body(move |_| {
            let value = value.clone();
            Box::pin(async move { Ok(Outcome::Value(value)) })
        })
    }

    /// Zero-argument provider running `T::default()`, keyed by `T`.
    pub fn for_default<T: Default + Any + Send + Sync>() -> Self {
        Self::builder(type_name::<T>())
            .call_sync(|_| Ok(T::default()))
            .rekeyed(ProviderKey::of_type::<T>())
    }

    pub fn key(&self) -> ProviderKey {
        self.key
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn parameters(&self) -> Option<&[Parameter]> {
        self.inner.parameters()
    }

    /// Whether both handles share one identity.
    pub fn same_as(&self, other: &Provider) -> bool {
        self.key == other.key
    }

    pub(crate) fn invoke(&self, args: Arguments) -> BoxFuture<'static, Result<Outcome, BoxError>> {
        self.inner.invoke(args)
    }

    pub(crate) fn rekeyed(mut self, key: ProviderKey) -> Self {
        self.key = key;
        self
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name())
            .field("key", &self.key)
            .finish()
    }
}

type Body = Box<dyn Fn(Arguments) -> BoxFuture<'static, Result<Outcome, BoxError>> + Send + Sync>;

struct FnProvider {
    name: String,
    params: Vec<Parameter>,
    body: Body,
}

impl Injectable for FnProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> Option<&[Parameter]> {
        Some(&self.params)
    }

    fn invoke(&self, args: Arguments) -> BoxFuture<'static, Result<Outcome, BoxError>> {
        (self.body)(args)
    }
}

/// Declares a provider's parameters, then its body.
pub struct ProviderBuilder {
    name: String,
    params: Vec<Parameter>,
}

impl ProviderBuilder {
    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    pub fn params(mut self, params: impl IntoIterator<Item = Parameter>) -> Self {
        self.params.extend(params);
        self
    }

    /// Asynchronous body returning a plain value.
    pub fn call<F, Fut, R>(self, body: F) -> Provider
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, BoxError>> + Send + 'static,
        R: Any + Send + Sync,
    {
        let body = Arc::new(body);
        self.body(move |args| {
            let body = body.clone();
            Box::pin(async move {
                let value = body(args).await?;
                Ok(Outcome::Value(Arc::new(value) as DynValue))
            })
        })
    }

    /// Synchronous body returning a plain value.
    pub fn call_sync<F, R>(self, body: F) -> Provider
    where
        F: Fn(Arguments) -> Result<R, BoxError> + Send + Sync + 'static,
        R: Any + Send + Sync,
    {
        let body = Arc::new(body);
        self.body(move |args| {
            let body = body.clone();
            Box::pin(async move {
                let value = body(args)?;
                Ok(Outcome::Value(Arc::new(value) as DynValue))
            })
        })
    }

    /// Body acquiring a [`Resource`].
    pub fn acquire<F, Fut>(self, body: F) -> Provider
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resource, BoxError>> + Send + 'static,
    {
        let body = Arc::new(body);
        self.body(move |args| {
            let body = body.clone();
            Box::pin(async move { body(args).await.map(Outcome::Resource) })
        })
    }

    fn body<F>(self, body: F) -> Provider
    where
        F: Fn(Arguments) -> BoxFuture<'static, Result<Outcome, BoxError>> + Send + Sync + 'static,
    {
        Provider::new(FnProvider {
            name: self.name,
            params: self.params,
            body: Box::new(body),
        })
    }
}

/// Resolved arguments handed to a provider body, in declared order.
#[derive(Clone, Default)]
pub struct Arguments {
    entries: Vec<(String, DynValue)>,
}

impl Arguments {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, value: DynValue) {
        self.entries.push((name.into(), value));
    }

    pub fn value(&self, name: &str) -> Option<&DynValue> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, value)| value)
    }

    /// Typed access to an argument.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, DiError> {
        let value = self.value(name).ok_or_else(|| DiError::Argument {
            parameter: name.to_string(),
            expected: type_name::<T>(),
            reason: "was not supplied",
        })?;
        value.clone().downcast::<T>().map_err(|_| DiError::Argument {
            parameter: name.to_string(),
            expected: type_name::<T>(),
            reason: "has a different type",
        })
    }

    pub fn get_cloned<T: Any + Send + Sync + Clone>(&self, name: &str) -> Result<T, DiError> {
        self.get::<T>(name).map(|value| (*value).clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
