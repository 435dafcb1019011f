//! Schema validator over a small JSON-schema subset
//!
//! Supported keywords:
//! - root: `type` (must be `object`), `properties`, `required`, `additionalProperties`
//! - property: `type`, `pattern`, `minimum`, `maximum`, `minLength`, `maxLength`

use super::{json_type_name, ValidationError, Validator, Violation};
use crate::document::Payload;
use crate::{Result, ShelfError};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Field type accepted by a property rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    Null,
    Object,
    Array,
}

impl FieldKind {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Null => value.is_null(),
            FieldKind::Object => value.is_object(),
            FieldKind::Array => value.is_array(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Null => "null",
            FieldKind::Object => "object",
            FieldKind::Array => "array",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSchema {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    properties: BTreeMap<String, RawProperty>,
    #[serde(default)]
    required: Vec<String>,
    #[serde(default = "default_true")]
    additional_properties: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProperty {
    #[serde(rename = "type")]
    kind: Option<FieldKind>,
    pattern: Option<String>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    min_length: Option<usize>,
    max_length: Option<usize>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug)]
struct FieldRule {
    kind: Option<FieldKind>,
    pattern: Option<Regex>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    min_length: Option<usize>,
    max_length: Option<usize>,
}

impl FieldRule {
    fn compile(name: &str, raw: RawProperty) -> Result<Self> {
        let pattern = raw
            .pattern
            .map(|p| {
                Regex::new(&p).map_err(|e| {
                    ShelfError::Config(format!("Invalid pattern for field {}: {}", name, e))
                })
            })
            .transpose()?;

        Ok(Self {
            kind: raw.kind,
            pattern,
            minimum: raw.minimum,
            maximum: raw.maximum,
            min_length: raw.min_length,
            max_length: raw.max_length,
        })
    }

    fn check(&self, field: &str, value: &Value, violations: &mut Vec<Violation>) {
        if let Some(kind) = self.kind {
            if !kind.accepts(value) {
                violations.push(Violation::new(
                    field,
                    format!("expected {}, found {}", kind.name(), json_type_name(value)),
                ));
                return;
            }
        }

        if let Some(s) = value.as_str() {
            let len = s.chars().count();
            if let Some(min) = self.min_length {
                if len < min {
                    violations.push(Violation::new(field, format!("shorter than {}", min)));
                }
            }
            if let Some(max) = self.max_length {
                if len > max {
                    violations.push(Violation::new(field, format!("longer than {}", max)));
                }
            }
            if let Some(pattern) = &self.pattern {
                if !pattern.is_match(s) {
                    violations.push(Violation::new(
                        field,
                        format!("does not match pattern {}", pattern.as_str()),
                    ));
                }
            }
        }

        if let Some(n) = value.as_f64() {
            if let Some(min) = self.minimum {
                if n < min {
                    violations.push(Violation::new(field, format!("less than minimum {}", min)));
                }
            }
            if let Some(max) = self.maximum {
                if n > max {
                    violations.push(Violation::new(field, format!("greater than maximum {}", max)));
                }
            }
        }
    }
}

/// Validator built from a JSON schema document
#[derive(Debug)]
pub struct SchemaValidator {
    properties: BTreeMap<String, FieldRule>,
    required: Vec<String>,
    additional_properties: bool,
}

impl SchemaValidator {
    /// Build a validator from a schema value
    pub fn from_value(schema: Value) -> Result<Self> {
        let raw: RawSchema = serde_json::from_value(schema)
            .map_err(|e| ShelfError::Config(format!("Invalid schema: {}", e)))?;

        if let Some(kind) = raw.kind.as_deref() {
            if kind != "object" {
                return Err(ShelfError::Config(format!(
                    "Schema root must be of type object, got {}",
                    kind
                )));
            }
        }

        let mut properties = BTreeMap::new();
        for (name, prop) in raw.properties {
            let rule = FieldRule::compile(&name, prop)?;
            properties.insert(name, rule);
        }

        Ok(Self {
            properties,
            required: raw.required,
            additional_properties: raw.additional_properties,
        })
    }

    /// Build a validator from schema text
    pub fn from_json_str(schema: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(schema)
            .map_err(|e| ShelfError::Config(format!("Invalid schema JSON: {}", e)))?;
        Self::from_value(value)
    }

    /// Load a schema file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

impl Validator for SchemaValidator {
    fn validate(&self, payload: &Payload) -> std::result::Result<(), ValidationError> {
        let mut violations = Vec::new();

        for field in &self.required {
            if !payload.contains_key(field) {
                violations.push(Violation::new(field, "required field missing"));
            }
        }

        for (field, value) in payload {
            match self.properties.get(field) {
                Some(rule) => rule.check(field, value, &mut violations),
                None if !self.additional_properties => {
                    violations.push(Violation::new(field, "field not allowed"));
                }
                None => {}
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(violations))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person_schema() -> SchemaValidator {
        SchemaValidator::from_value(json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "minLength": 1},
                "age": {"type": "integer", "minimum": 0},
                "email": {"type": "string", "pattern": "^[^@\\s]+@[^@\\s]+$"}
            },
            "required": ["name"],
            "additionalProperties": false
        }))
        .unwrap()
    }

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_valid_document() {
        let schema = person_schema();
        let doc = payload(json!({"name": "John Doe", "age": 30, "email": "john.doe@example.com"}));
        assert!(schema.validate(&doc).is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let schema = person_schema();
        let err = schema
            .validate(&payload(json!({"age": 30, "email": "john.doe@example.com"})))
            .unwrap_err();
        assert_eq!(err.violations(), &[Violation::new("name", "required field missing")]);
    }

    #[test]
    fn test_extra_field_rejected() {
        let schema = person_schema();
        let err = schema
            .validate(&payload(json!({"name": "John", "extra": "data"})))
            .unwrap_err();
        assert_eq!(err.violations()[0].field, "extra");
    }

    #[test]
    fn test_type_and_range_violations_reported_together() {
        let schema = person_schema();
        let err = schema
            .validate(&payload(json!({"name": "", "age": -1, "email": "nope"})))
            .unwrap_err();
        let fields: Vec<_> = err.violations().iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "age", "email"]);

        let err = schema
            .validate(&payload(json!({"name": "Jo", "age": 2.5})))
            .unwrap_err();
        assert_eq!(err.violations()[0].reason, "expected integer, found number");
    }

    #[test]
    fn test_additional_properties_default_allows_extras() {
        let schema = SchemaValidator::from_json_str(r#"{"required": ["id"]}"#).unwrap();
        assert!(schema.validate(&payload(json!({"id": 1, "other": true}))).is_ok());
    }

    #[test]
    fn test_invalid_schemas() {
        assert!(matches!(
            SchemaValidator::from_value(json!({"type": "array"})),
            Err(ShelfError::Config(_))
        ));
        assert!(matches!(
            SchemaValidator::from_value(json!({"properties": {"a": {"pattern": "("}}})),
            Err(ShelfError::Config(_))
        ));
        assert!(matches!(
            SchemaValidator::from_value(json!({"properties": {"a": {"type": "date"}}})),
            Err(ShelfError::Config(_))
        ));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, r#"{"required": ["name"]}"#).unwrap();

        let schema = SchemaValidator::from_path(&path).unwrap();
        assert!(schema.validate(&Payload::new()).is_err());
    }
}
