//! Payload validation
//!
//! The storage layer never inspects payload shape itself. Every create and
//! update hands the payload to a [`Validator`] first; a violation aborts the
//! write before anything touches disk or cache.

mod validator;

pub use validator::{FieldKind, SchemaValidator};

use crate::document::Payload;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Validates payloads before they are written
pub trait Validator: Send + Sync {
    fn validate(&self, payload: &Payload) -> Result<(), ValidationError>;
}

/// Validator that accepts every payload
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn validate(&self, _payload: &Payload) -> Result<(), ValidationError> {
        Ok(())
    }
}

impl<F> Validator for F
where
    F: Fn(&Payload) -> Result<(), ValidationError> + Send + Sync,
{
    fn validate(&self, payload: &Payload) -> Result<(), ValidationError> {
        self(payload)
    }
}

/// A single rule violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Field path (`$root` for the payload itself)
    pub field: String,
    /// Human-readable reason
    pub reason: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Payload failed validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", join_violations(.violations))]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    pub fn single(violation: Violation) -> Self {
        Self {
            violations: vec![violation],
        }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }
}

fn join_violations(violations: &[Violation]) -> String {
    let parts: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
    parts.join("; ")
}

/// JSON type name used in violation messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accept_all() {
        assert!(AcceptAll.validate(&Payload::new()).is_ok());
    }

    #[test]
    fn test_closure_validator() {
        let no_empty = |p: &Payload| {
            if p.is_empty() {
                Err(ValidationError::single(Violation::new("$root", "empty payload")))
            } else {
                Ok(())
            }
        };

        assert!(no_empty.validate(&Payload::new()).is_err());
        let payload = json!({"a": 1}).as_object().cloned().unwrap();
        assert!(no_empty.validate(&payload).is_ok());
    }

    #[test]
    fn test_error_display_joins_violations() {
        let err = ValidationError::new(vec![
            Violation::new("name", "required field missing"),
            Violation::new("extra", "field not allowed"),
        ]);
        assert_eq!(
            err.to_string(),
            "name: required field missing; extra: field not allowed"
        );
    }

    #[test]
    fn test_error_wraps_into_shelf_error() {
        let err = ValidationError::single(Violation::new("age", "expected integer"));
        let source: &dyn std::error::Error = &err;
        assert!(source.source().is_none());

        let wrapped = crate::ShelfError::from(err);
        assert_eq!(wrapped.to_string(), "Validation failed: age: expected integer");
    }
}
