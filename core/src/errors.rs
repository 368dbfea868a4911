use crate::types::BoxError;
use crate::validation::ValidationError;
use std::any::Any;
use std::time::Duration;
use thiserror::Error;

/// **ERROR CODES**
///
/// Stable identifiers for every `DiError` variant, returned by [`DiError::code`].
pub mod codes {
    pub const SIGNATURE: &str = "TINY_DI_SIGNATURE_ERROR";
    pub const MISSING_VALUE: &str = "TINY_DI_MISSING_VALUE";
    pub const CIRCULAR_DEPENDENCY: &str = "TINY_DI_CIRCULAR_DEPENDENCY";
    pub const INVALID_DEPENDENCY: &str = "TINY_DI_INVALID_DEPENDENCY";
    pub const VALIDATION: &str = "TINY_DI_VALIDATION_ERROR";
    pub const INVOCATION: &str = "TINY_DI_INVOCATION_ERROR";
    pub const ARGUMENT: &str = "TINY_DI_ARGUMENT_ERROR";
    pub const RETURN_TYPE: &str = "TINY_DI_RETURN_TYPE_ERROR";
    pub const TIMEOUT: &str = "TINY_DI_TIMEOUT";
    pub const FINALIZATION: &str = "TINY_DI_FINALIZATION_ERROR";
}

#[derive(Debug, Error)]
pub enum DiError {
    #[error("cannot inspect signature of `{callable}`: {message}")]
    Signature { callable: String, message: String },

    #[error("no value provided for required argument `{parameter}` of `{callable}`")]
    MissingValue { parameter: String, callable: String },

    #[error("circular dependency detected: `{callable}` is already being resolved")]
    CircularDependency { callable: String },

    #[error("dependency for parameter `{parameter}` of `{callable}` has no callable: {reason}")]
    InvalidDependency {
        parameter: String,
        callable: String,
        reason: String,
    },

    #[error("parameter `{parameter}` of `{callable}` rejected: {source}")]
    Validation {
        parameter: String,
        callable: String,
        #[source]
        source: ValidationError,
    },

    #[error("`{callable}` failed: {source}")]
    Invocation {
        callable: String,
        #[source]
        source: BoxError,
    },

    #[error("argument `{parameter}` {reason} (expected `{expected}`)")]
    Argument {
        parameter: String,
        expected: &'static str,
        reason: &'static str,
    },

    #[error("`{callable}` returned a value that is not a `{expected}`")]
    ReturnType {
        callable: String,
        expected: &'static str,
    },

    #[error("TIMEOUT ERROR: `{callable}` exceeded {timeout:?}")]
    Timeout { callable: String, timeout: Duration },

    #[error(transparent)]
    Finalization(#[from] ChainedFinalizationError),

    /// Resolution failed and draining the already acquired resources failed too.
    /// `primary` is the resolution failure; the finalization chain is its source.
    #[error("{primary} (cleanup also failed)")]
    Unwound {
        primary: Box<DiError>,
        #[source]
        finalization: ChainedFinalizationError,
    },
}

impl DiError {
    pub fn code(&self) -> &'static str {
        match self {
            DiError::Signature { .. } => codes::SIGNATURE,
            DiError::MissingValue { .. } => codes::MISSING_VALUE,
            DiError::CircularDependency { .. } => codes::CIRCULAR_DEPENDENCY,
            DiError::InvalidDependency { .. } => codes::INVALID_DEPENDENCY,
            DiError::Validation { .. } => codes::VALIDATION,
            DiError::Invocation { .. } => codes::INVOCATION,
            DiError::Argument { .. } => codes::ARGUMENT,
            DiError::ReturnType { .. } => codes::RETURN_TYPE,
            DiError::Timeout { .. } => codes::TIMEOUT,
            DiError::Finalization(_) => codes::FINALIZATION,
            DiError::Unwound { primary, .. } => primary.code(),
        }
    }

    /// The failure a caller should act on: the resolution error when cleanup
    /// failed on top of it, otherwise `self`.
    pub fn primary(&self) -> &DiError {
        match self {
            DiError::Unwound { primary, .. } => primary.primary(),
            other => other,
        }
    }

    /// Finalizer failures attached to this error, most recent first.
    pub fn finalization(&self) -> Option<&ChainedFinalizationError> {
        match self {
            DiError::Finalization(chain) => Some(chain),
            DiError::Unwound { finalization, .. } => Some(finalization),
            _ => None,
        }
    }
}

/// One failed finalizer, linked to the failure of the finalizer that ran
/// before it. The head of the chain is the last finalizer that failed.
#[derive(Debug, Error)]
#[error("finalizer of `{provider}` failed: {reason}")]
pub struct ChainedFinalizationError {
    provider: String,
    reason: BoxError,
    #[source]
    cause: Option<Box<ChainedFinalizationError>>,
}

impl ChainedFinalizationError {
    pub(crate) fn new(
        provider: impl Into<String>,
        reason: BoxError,
        cause: Option<ChainedFinalizationError>,
    ) -> Self {
        Self {
            provider: provider.into(),
            reason,
            cause: cause.map(Box::new),
        }
    }

    /// Name of the provider whose finalizer failed.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn reason(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.reason.as_ref()
    }

    pub fn cause(&self) -> Option<&ChainedFinalizationError> {
        self.cause.as_deref()
    }

    /// Walks the chain from the most recent failure back to the first one.
    pub fn chain(&self) -> impl Iterator<Item = &ChainedFinalizationError> {
        std::iter::successors(Some(self), |link| link.cause())
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
