//! # TINY-DI VALIDATION MODULE
//!
//! **VALIDATOR CAPABILITY FOR RESOLVED PARAMETERS**
//!
//! The resolver hands every candidate value of a parameter with a declared type
//! to the context's [`TypeValidator`], once per parameter per root call. The
//! validator may coerce the value or reject it.
//!
//! [`RuleValidator`] is the bundled adapter: it keeps per-type rules built
//! from coercions and the typed [`Validator`] implementations in
//! [`validators`].
//!
//! ## USAGE
//!
//! ```rust
//! use tiny_di::validation::{NumericRangeValidator, RuleValidator};
//!
//! let validator = RuleValidator::new()
//!     .coerce::<String, i64, _>(|raw| raw.parse().map_err(|e| format!("{e}")))
//!     .check::<i64, _>(NumericRangeValidator::i64_range(0, 100))
//!     .strict();
//! ```

use crate::types::{DynValue, TypeInfo};
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod validators;

pub use validators::{JsonType, NumericRangeValidator, SchemaValidator, StringValidator};

/// **VALIDATION ERROR CODES**
pub mod error_codes {
    pub const TYPE_MISMATCH: &str = "TINY_DI_VALIDATION_TYPE_MISMATCH";
    pub const COERCION_FAILED: &str = "TINY_DI_VALIDATION_COERCION_FAILED";
    pub const OUT_OF_RANGE: &str = "TINY_DI_VALIDATION_OUT_OF_RANGE";
    pub const SCHEMA_MISMATCH: &str = "TINY_DI_VALIDATION_SCHEMA_MISMATCH";
    pub const INVALID_INPUT: &str = "TINY_DI_VALIDATION_INVALID_INPUT";
    pub const VALIDATOR_PANICKED: &str = "TINY_DI_VALIDATION_VALIDATOR_PANICKED";
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ValidationError {
    pub code: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// **VALIDATOR CAPABILITY**
///
/// Checks (and possibly coerces) a candidate against the declared type of the
/// parameter it is about to fill. Must be a pure function of its inputs.
pub trait TypeValidator: Send + Sync {
    fn validate(&self, declared: &TypeInfo, value: DynValue) -> Result<DynValue, ValidationError>;
}

impl<F> TypeValidator for F
where
    F: Fn(&TypeInfo, DynValue) -> Result<DynValue, ValidationError> + Send + Sync,
{
    fn validate(&self, declared: &TypeInfo, value: DynValue) -> Result<DynValue, ValidationError> {
        self(declared, value)
    }
}

/// **TYPED VALIDATOR TRAIT**
///
/// Validation of a concrete type. [`RuleValidator::check`] lifts these into
/// rules applied to type-erased candidates.
pub trait Validator {
    type Input;
    type Output;

    /// **GUARANTEE**: MUST NOT panic; every rejection is a `ValidationError`.
    fn validate(&self, input: Self::Input) -> Result<Self::Output, ValidationError>;
}

type Rule = Box<dyn Fn(DynValue) -> Result<DynValue, ValidationError> + Send + Sync>;

/// **RULE-BASED VALIDATOR**
///
/// Per declared type, an ordered list of rules. A rule that does not apply to
/// the candidate's runtime type passes it through untouched. In strict mode
/// the value left after all rules must be an instance of the declared type.
#[derive(Default)]
pub struct RuleValidator {
    rules: HashMap<TypeId, Vec<Rule>>,
    strict: bool,
}

impl RuleValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject candidates whose runtime type differs from the declared type.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Parameters declared as `T` accept `S` values, converted by `convert`.
    pub fn coerce<S, T, F>(mut self, convert: F) -> Self
    where
        S: Any + Send + Sync,
        T: Any + Send + Sync,
        F: Fn(&S) -> Result<T, String> + Send + Sync + 'static,
    {
        self.push::<T>(Box::new(move |value: DynValue| {
            let Some(source) = value.downcast_ref::<S>() else {
                return Ok(value);
            };
            convert(source)
                .map(|converted| Arc::new(converted) as DynValue)
                .map_err(|message| {
                    ValidationError::new(
                        error_codes::COERCION_FAILED,
                        format!(
                            "cannot convert {} into {}: {message}",
                            type_name::<S>(),
                            type_name::<T>()
                        ),
                    )
                })
        }));
        self
    }

    /// Parameters declared as `T` are checked by `validator`.
    pub fn check<T, V>(mut self, validator: V) -> Self
    where
        T: Any + Send + Sync + Clone,
        V: Validator<Input = T, Output = T> + Send + Sync + 'static,
    {
        self.push::<T>(Box::new(move |value: DynValue| {
            let Some(typed) = value.downcast_ref::<T>() else {
                return Ok(value);
            };
            validator
                .validate(typed.clone())
                .map(|checked| Arc::new(checked) as DynValue)
        }));
        self
    }

    fn push<T: Any>(&mut self, rule: Rule) {
        self.rules.entry(TypeId::of::<T>()).or_default().push(rule);
    }
}

impl TypeValidator for RuleValidator {
    fn validate(&self, declared: &TypeInfo, value: DynValue) -> Result<DynValue, ValidationError> {
        let mut value = value;
        if let Some(rules) = self.rules.get(&declared.id()) {
            for rule in rules {
                value = rule(value)?;
            }
        }
        if self.strict && !declared.accepts(value.as_ref()) {
            return Err(ValidationError::new(
                error_codes::TYPE_MISMATCH,
                format!("expected a value of type {}", declared.name()),
            ));
        }
        Ok(value)
    }
}
