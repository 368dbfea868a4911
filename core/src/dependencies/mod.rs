//! # DEPENDENCY RESOLUTION
//!
//! Providers declare parameters; the resolver fills each one from a marker,
//! the context's values or the parameter's default, invokes the provider and
//! finalizes acquired resources once the root call is over.

mod cleanup;
pub mod context;
pub mod provider;
mod resolver;
mod scope;
pub mod signature;
pub mod types;

pub use context::{Context, Overrides};
pub use provider::{Arguments, Injectable, Outcome, Provider, ProviderBuilder, ProviderKey, Resource};
pub use signature::{describe, DefaultKind, ParameterDescriptor};
pub use types::{
    Depends, ForeignMarker, Marker, MarkerField, MarkerSet, MarkerShape, ParamDefault, Parameter,
    Security,
};
