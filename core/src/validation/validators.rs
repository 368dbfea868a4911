//! # TYPED VALIDATORS
//!
//! Concrete `Validator` implementations that `RuleValidator::check` attaches to
//! declared parameter types.

use super::{error_codes, ValidationError, Validator};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::ops::RangeInclusive;

// ================================================================================================
// NUMERIC RANGE VALIDATOR
// ================================================================================================

/// **NUMERIC RANGE VALIDATOR**
///
/// Accepts values inside an inclusive range.
#[derive(Debug, Clone)]
pub struct NumericRangeValidator<T> {
    range: RangeInclusive<T>,
    type_name: &'static str,
}

impl<T> NumericRangeValidator<T>
where
    T: PartialOrd + Copy + std::fmt::Display,
{
    pub fn new(range: RangeInclusive<T>, type_name: &'static str) -> Self {
        Self { range, type_name }
    }
}

impl NumericRangeValidator<i64> {
    pub fn i64_range(min: i64, max: i64) -> Self {
        Self::new(min..=max, "i64")
    }

    /// Non-negative identifiers (request ids, user ids).
    pub fn id() -> Self {
        Self::new(0..=i64::MAX, "i64")
    }
}

impl NumericRangeValidator<f64> {
    pub fn f64_range(min: f64, max: f64) -> Self {
        Self::new(min..=max, "f64")
    }
}

impl<T> Validator for NumericRangeValidator<T>
where
    T: PartialOrd + Copy + std::fmt::Display,
{
    type Input = T;
    type Output = T;

    fn validate(&self, input: T) -> Result<T, ValidationError> {
        if self.range.contains(&input) {
            return Ok(input);
        }
        Err(ValidationError::new(
            error_codes::OUT_OF_RANGE,
            format!(
                "value {} outside valid {} range {}..={}",
                input,
                self.type_name,
                self.range.start(),
                self.range.end()
            ),
        ))
    }
}

// ================================================================================================
// STRING VALIDATOR
// ================================================================================================

/// **STRING VALIDATOR**
///
/// Emptiness and length (in characters) limits for `String` parameters.
#[derive(Debug, Clone)]
pub struct StringValidator {
    allow_empty: bool,
    max_length: Option<usize>,
}

impl StringValidator {
    pub fn new() -> Self {
        Self {
            allow_empty: true,
            max_length: None,
        }
    }

    pub fn non_empty(mut self) -> Self {
        self.allow_empty = false;
        self
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }
}

impl Default for StringValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for StringValidator {
    type Input = String;
    type Output = String;

    fn validate(&self, input: String) -> Result<String, ValidationError> {
        if input.is_empty() && !self.allow_empty {
            return Err(ValidationError::new(
                error_codes::INVALID_INPUT,
                "empty string not allowed",
            ));
        }
        if let Some(max_length) = self.max_length {
            let length = input.chars().count();
            if length > max_length {
                return Err(ValidationError::new(
                    error_codes::OUT_OF_RANGE,
                    format!("string length {length} exceeds maximum {max_length}"),
                ));
            }
        }
        Ok(input)
    }
}

// ================================================================================================
// SCHEMA VALIDATOR
// ================================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Null,
}

impl JsonType {
    fn matches(self, value: &JsonValue) -> bool {
        matches!(
            (value, self),
            (JsonValue::String(_), JsonType::String)
                | (JsonValue::Number(_), JsonType::Number)
                | (JsonValue::Bool(_), JsonType::Boolean)
                | (JsonValue::Array(_), JsonType::Array)
                | (JsonValue::Object(_), JsonType::Object)
                | (JsonValue::Null, JsonType::Null)
        )
    }
}

/// **SCHEMA VALIDATOR**
///
/// Field presence and JSON type checks for `serde_json::Value` parameters,
/// typically values loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct SchemaValidator {
    required_fields: Vec<String>,
    field_types: HashMap<String, JsonType>,
    strict: bool,
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require_field(mut self, field: impl Into<String>, json_type: JsonType) -> Self {
        let field = field.into();
        self.required_fields.push(field.clone());
        self.field_types.insert(field, json_type);
        self
    }

    pub fn optional_field(mut self, field: impl Into<String>, json_type: JsonType) -> Self {
        self.field_types.insert(field.into(), json_type);
        self
    }

    /// Reject fields that were not declared.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
}

impl Validator for SchemaValidator {
    type Input = JsonValue;
    type Output = JsonValue;

    fn validate(&self, input: JsonValue) -> Result<JsonValue, ValidationError> {
        let JsonValue::Object(fields) = &input else {
            return Err(ValidationError::new(
                error_codes::SCHEMA_MISMATCH,
                "expected a JSON object",
            ));
        };

        if let Some(missing) = self
            .required_fields
            .iter()
            .find(|field| !fields.contains_key(field.as_str()))
        {
            return Err(ValidationError::new(
                error_codes::SCHEMA_MISMATCH,
                format!("required field '{missing}' missing"),
            ));
        }

        for (name, value) in fields {
            match self.field_types.get(name) {
                Some(expected) if !expected.matches(value) => {
                    return Err(ValidationError::new(
                        error_codes::SCHEMA_MISMATCH,
                        format!("field '{name}' has invalid type, expected {expected:?}"),
                    ));
                }
                None if self.strict => {
                    return Err(ValidationError::new(
                        error_codes::SCHEMA_MISMATCH,
                        format!("unknown field '{name}' in strict mode"),
                    ));
                }
                _ => {}
            }
        }

        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod numeric_validator_tests {
        use super::*;

        #[test]
        fn test_boundaries_are_inclusive() {
            let validator = NumericRangeValidator::i64_range(10, 20);
            assert!(validator.validate(10).is_ok());
            assert!(validator.validate(20).is_ok());
            assert!(validator.validate(9).is_err());
            assert!(validator.validate(21).is_err());
        }

        #[test]
        fn test_id_rejects_negative() {
            let err = NumericRangeValidator::id().validate(-1).unwrap_err();
            assert_eq!(err.code, error_codes::OUT_OF_RANGE);
            assert!(err.message.contains("-1"));
        }

        #[test]
        fn test_f64_range() {
            let validator = NumericRangeValidator::f64_range(0.0, 1.0);
            assert!(validator.validate(0.5).is_ok());
            assert!(validator.validate(1.5).is_err());
        }
    }

    mod string_validator_tests {
        use super::*;

        #[test]
        fn test_empty_allowed_by_default() {
            assert_eq!(StringValidator::new().validate(String::new()).unwrap(), "");
        }

        #[test]
        fn test_empty_rejected_when_required() {
            let err = StringValidator::new()
                .non_empty()
                .validate(String::new())
                .unwrap_err();
            assert_eq!(err.code, error_codes::INVALID_INPUT);
        }

        #[test]
        fn test_length_counts_characters() {
            let validator = StringValidator::new().max_length(5);
            assert!(validator.validate("héllo".to_string()).is_ok());
            let err = validator.validate("toolong".to_string()).unwrap_err();
            assert_eq!(err.code, error_codes::OUT_OF_RANGE);
        }
    }

    mod schema_validator_tests {
        use super::*;

        #[test]
        fn test_valid_object() {
            let validator = SchemaValidator::new()
                .require_field("host", JsonType::String)
                .optional_field("port", JsonType::Number);

            let data = json!({"host": "localhost", "port": 5432});
            assert_eq!(validator.validate(data.clone()).unwrap(), data);
        }

        #[test]
        fn test_missing_required_field() {
            let validator = SchemaValidator::new().require_field("host", JsonType::String);
            let err = validator.validate(json!({"port": 1})).unwrap_err();
            assert!(err.message.contains("'host' missing"));
        }

        #[test]
        fn test_wrong_type_and_strict_mode() {
            let validator = SchemaValidator::new().require_field("port", JsonType::Number);
            assert!(validator.validate(json!({"port": "5432"})).is_err());

            let strict = SchemaValidator::new()
                .require_field("host", JsonType::String)
                .strict();
            let err = strict
                .validate(json!({"host": "h", "extra": true}))
                .unwrap_err();
            assert!(err.message.contains("unknown field"));
        }

        #[test]
        fn test_non_object_rejected() {
            let err = SchemaValidator::new().validate(json!([1, 2])).unwrap_err();
            assert_eq!(err.code, error_codes::SCHEMA_MISMATCH);
        }
    }
}
