use crate::dependencies::provider::Provider;
use crate::dependencies::types::{Depends, MarkerSet, ParamDefault, Parameter};
use crate::errors::{panic_message, DiError};
use crate::types::{DynValue, TypeInfo};
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// How a parameter gets its value when nothing is injected by name.
#[derive(Debug, Clone)]
pub enum DefaultKind {
    Dependency(Depends),
    Constant(DynValue),
    None,
}

#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    pub name: String,
    pub declared: Option<TypeInfo>,
    pub default: DefaultKind,
}

/// Lists `provider`'s parameters in declared order, classifying each default
/// against the recognized marker shapes.
///
/// A marker whose shape is not in `markers` is not a dependency; it becomes a
/// constant default holding the marker itself.
pub fn describe(provider: &Provider, markers: &MarkerSet) -> Result<Vec<ParameterDescriptor>, DiError> {
    let params = declared_parameters(provider)?.ok_or_else(|| DiError::Signature {
        callable: provider.name().to_string(),
        message: "callable exposes no signature".to_string(),
    })?;

    let mut seen = HashSet::with_capacity(params.len());
    let mut descriptors = Vec::with_capacity(params.len());
    for param in params {
        if param.name().is_empty() {
            return Err(DiError::Signature {
                callable: provider.name().to_string(),
                message: "parameter with an empty name".to_string(),
            });
        }
        if !seen.insert(param.name()) {
            return Err(DiError::Signature {
                callable: provider.name().to_string(),
                message: format!("parameter `{}` is declared twice", param.name()),
            });
        }

        let default = match param.default() {
            ParamDefault::Marker(marker) => match markers.recognize(marker) {
                Some(depends) => DefaultKind::Dependency(depends),
                None => DefaultKind::Constant(Arc::new(marker.clone())),
            },
            ParamDefault::Constant(value) => DefaultKind::Constant(value.clone()),
            ParamDefault::Required => DefaultKind::None,
        };
        descriptors.push(ParameterDescriptor {
            name: param.name().to_string(),
            declared: param.declared_type().cloned(),
            default,
        });
    }
    Ok(descriptors)
}

/// `provider.parameters()`, with a panicking implementation reported as a
/// signature error.
pub(crate) fn declared_parameters(provider: &Provider) -> Result<Option<&[Parameter]>, DiError> {
    std::panic::catch_unwind(AssertUnwindSafe(|| provider.parameters())).map_err(|payload| {
        DiError::Signature {
            callable: provider.name().to_string(),
            message: panic_message(payload),
        }
    })
}
