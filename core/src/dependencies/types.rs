use crate::dependencies::provider::Provider;
use crate::types::{DynValue, TypeInfo};
use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// **DEPENDENCY MARKER**
///
/// Placed as a parameter default: "satisfy this parameter by calling a
/// provider". Without an explicit provider the parameter's declared type is
/// used to find one.
#[derive(Debug, Clone)]
pub struct Depends {
    dependency: Option<Provider>,
    use_cache: bool,
}

impl Depends {
    pub fn new(dependency: Option<Provider>, use_cache: bool) -> Self {
        Self {
            dependency,
            use_cache,
        }
    }

    pub fn on(dependency: &Provider) -> Self {
        Self::new(Some(dependency.clone()), true)
    }

    /// Marker whose provider is inferred from the declared type.
    pub fn inferred() -> Self {
        Self::new(None, true)
    }

    /// Invoke the provider again for every use within one root call.
    pub fn no_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    pub fn dependency(&self) -> Option<&Provider> {
        self.dependency.as_ref()
    }

    pub fn use_cache(&self) -> bool {
        self.use_cache
    }
}

impl Default for Depends {
    fn default() -> Self {
        Self::inferred()
    }
}

/// **SECURITY MARKER**
///
/// A [`Depends`] that also lists authorization scopes. The scopes are carried
/// for the application; resolution only looks at the inner marker.
#[derive(Debug, Clone)]
pub struct Security {
    depends: Depends,
    scopes: Vec<String>,
}

impl Security {
    pub fn new(depends: Depends, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            depends,
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn depends(&self) -> &Depends {
        &self.depends
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

/// Field of a [`ForeignMarker`].
#[derive(Clone)]
pub enum MarkerField {
    Provider(Provider),
    Flag(bool),
    Value(DynValue),
}

impl fmt::Debug for MarkerField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerField::Provider(provider) => f.debug_tuple("Provider").field(provider).finish(),
            MarkerField::Flag(flag) => f.debug_tuple("Flag").field(flag).finish(),
            MarkerField::Value(_) => f.write_str("Value(..)"),
        }
    }
}

/// Marker declared by another framework, described as a bag of named fields.
#[derive(Debug, Clone)]
pub struct ForeignMarker {
    shape: Cow<'static, str>,
    fields: HashMap<String, MarkerField>,
}

impl ForeignMarker {
    pub fn new(shape: impl Into<Cow<'static, str>>) -> Self {
        Self {
            shape: shape.into(),
            fields: HashMap::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: MarkerField) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn shape(&self) -> &str {
        &self.shape
    }

    pub fn get(&self, name: &str) -> Option<&MarkerField> {
        self.fields.get(name)
    }
}

/// Every marker shape a parameter default can take.
#[derive(Debug, Clone)]
pub enum Marker {
    Depends(Depends),
    Security(Security),
    Foreign(ForeignMarker),
}

impl Marker {
    pub fn shape(&self) -> &str {
        match self {
            Marker::Depends(_) => MarkerShape::DEPENDS,
            Marker::Security(_) => MarkerShape::SECURITY,
            Marker::Foreign(foreign) => foreign.shape(),
        }
    }
}

impl From<Depends> for Marker {
    fn from(depends: Depends) -> Self {
        Marker::Depends(depends)
    }
}

impl From<Security> for Marker {
    fn from(security: Security) -> Self {
        Marker::Security(security)
    }
}

impl From<ForeignMarker> for Marker {
    fn from(foreign: ForeignMarker) -> Self {
        Marker::Foreign(foreign)
    }
}

/// A recognized marker shape and the function reading a [`Depends`] out of it.
#[derive(Clone)]
pub struct MarkerShape {
    name: Cow<'static, str>,
    extract: fn(&Marker) -> Option<Depends>,
}

impl MarkerShape {
    pub const DEPENDS: &'static str = "Depends";
    pub const SECURITY: &'static str = "Security";

    pub fn depends() -> Self {
        Self {
            name: Cow::Borrowed(Self::DEPENDS),
            extract: |marker: &Marker| match marker {
                Marker::Depends(depends) => Some(depends.clone()),
                _ => None,
            },
        }
    }

    pub fn security() -> Self {
        Self {
            name: Cow::Borrowed(Self::SECURITY),
            extract: |marker: &Marker| match marker {
                Marker::Security(security) => Some(security.depends().clone()),
                _ => None,
            },
        }
    }

    /// Foreign shape read by field name: `dependency` holds the provider and
    /// `use_cache` the cache flag (default `true`). Other fields are ignored.
    pub fn structural(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            extract: extract_structural,
        }
    }

    /// Shape by name: the built-in names map to their shapes, anything else is
    /// treated as structural.
    pub fn named(name: &str) -> Self {
        match name {
            Self::DEPENDS => Self::depends(),
            Self::SECURITY => Self::security(),
            other => Self::structural(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for MarkerShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MarkerShape").field(&self.name).finish()
    }
}

fn extract_structural(marker: &Marker) -> Option<Depends> {
    let Marker::Foreign(foreign) = marker else {
        return None;
    };
    let dependency = match foreign.get("dependency") {
        Some(MarkerField::Provider(provider)) => Some(provider.clone()),
        _ => None,
    };
    let use_cache = match foreign.get("use_cache") {
        Some(MarkerField::Flag(flag)) => *flag,
        _ => true,
    };
    Some(Depends::new(dependency, use_cache))
}

/// The marker shapes a context recognizes.
#[derive(Debug, Clone)]
pub struct MarkerSet {
    shapes: Arc<[MarkerShape]>,
}

impl MarkerSet {
    pub fn new(shapes: impl IntoIterator<Item = MarkerShape>) -> Self {
        Self {
            shapes: shapes.into_iter().collect(),
        }
    }

    /// `Depends` and `Security`.
    pub fn extended() -> Self {
        Self::new([MarkerShape::depends(), MarkerShape::security()])
    }

    pub fn with_shape(&self, shape: MarkerShape) -> Self {
        Self::new(self.shapes.iter().cloned().chain([shape]))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.shapes.iter().map(MarkerShape::name)
    }

    /// The dependency described by `marker`, if its shape is recognized.
    pub fn recognize(&self, marker: &Marker) -> Option<Depends> {
        self.shapes
            .iter()
            .find(|shape| shape.name() == marker.shape())
            .and_then(|shape| (shape.extract)(marker))
    }
}

impl Default for MarkerSet {
    fn default() -> Self {
        Self::new([MarkerShape::depends()])
    }
}

/// Default of a declared parameter.
#[derive(Clone)]
pub enum ParamDefault {
    Marker(Marker),
    Constant(DynValue),
    Required,
}

impl fmt::Debug for ParamDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamDefault::Marker(marker) => f.debug_tuple("Marker").field(marker).finish(),
            ParamDefault::Constant(_) => f.write_str("Constant(..)"),
            ParamDefault::Required => f.write_str("Required"),
        }
    }
}

/// **PARAMETER DECLARATION**
///
/// One entry of a provider's signature.
#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    declared: Option<TypeInfo>,
    default: ParamDefault,
}

impl Parameter {
    /// Untyped parameter without a default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared: None,
            default: ParamDefault::Required,
        }
    }

    pub fn typed<T: Any + Send + Sync>(self) -> Self {
        self.declared(TypeInfo::of::<T>())
    }

    pub fn declared(mut self, declared: TypeInfo) -> Self {
        self.declared = Some(declared);
        self
    }

    pub fn default_value<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.default = ParamDefault::Constant(Arc::new(value));
        self
    }

    pub fn marker(mut self, marker: impl Into<Marker>) -> Self {
        self.default = ParamDefault::Marker(marker.into());
        self
    }

    pub fn depends(self, dependency: &Provider) -> Self {
        self.marker(Depends::on(dependency))
    }

    pub fn depends_uncached(self, dependency: &Provider) -> Self {
        self.marker(Depends::on(dependency).no_cache())
    }

    /// `Depends()` without a provider: the declared type supplies one.
    pub fn inferred(self) -> Self {
        self.marker(Depends::inferred())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> Option<&TypeInfo> {
        self.declared.as_ref()
    }

    pub fn default(&self) -> &ParamDefault {
        &self.default
    }
}
