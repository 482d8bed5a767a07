//! Field definitions for entities.

use rkyv::{Archive, Deserialize, Serialize};

use super::types::FieldType;
use crate::value::Value;

/// A field definition within an entity.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Field data type.
    pub field_type: FieldType,
    /// Whether the field is required (non-nullable).
    pub required: bool,
    /// Default value if not provided.
    pub default: Option<DefaultValue>,
}

/// Default value for a field, applied at insert time when the field is
/// absent or null.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum DefaultValue {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// String value.
    String(String),
    /// Current timestamp (evaluated at insert time).
    CurrentTimestamp,
    /// JSON document, kept as text.
    Json(String),
}

impl DefaultValue {
    /// Materialize the default at insert time `now` (microseconds).
    pub fn resolve(&self, now: i64) -> Value {
        match self {
            DefaultValue::Null => Value::Null,
            DefaultValue::Bool(b) => Value::Bool(*b),
            DefaultValue::Int(i) => Value::Int(*i),
            DefaultValue::Float(f) => Value::Float(*f),
            DefaultValue::String(s) => Value::String(s.clone()),
            DefaultValue::CurrentTimestamp => Value::Timestamp(now),
            DefaultValue::Json(text) => serde_json::from_str(text)
                .map(Value::Json)
                .unwrap_or(Value::Null),
        }
    }

    /// Check whether this default can populate a field.
    ///
    /// Returns the reason on mismatch.
    pub fn check_fits(&self, field_type: FieldType, required: bool) -> Result<(), String> {
        let fits = match self {
            DefaultValue::Null => {
                return if required {
                    Err("null default on a required field".to_string())
                } else {
                    Ok(())
                };
            }
            DefaultValue::Bool(_) => field_type == FieldType::Bool,
            DefaultValue::Int(_) => field_type.is_numeric(),
            DefaultValue::Float(_) => field_type == FieldType::Float,
            DefaultValue::String(_) => field_type == FieldType::String,
            DefaultValue::CurrentTimestamp => field_type == FieldType::Timestamp,
            DefaultValue::Json(text) => {
                if serde_json::from_str::<serde_json::Value>(text).is_err() {
                    return Err("JSON default does not parse".to_string());
                }
                field_type == FieldType::Json
            }
        };

        if fits {
            Ok(())
        } else {
            Err(format!("{:?} default on a {} field", self, field_type.name()))
        }
    }
}

impl FieldDef {
    /// Create a new required field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            default: None,
        }
    }

    /// Create an optional field (nullable).
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            default: None,
        }
    }

    /// Set the default value.
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Check if this field has a default value.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_def_builder() {
        let field =
            FieldDef::new("enabled", FieldType::Bool).with_default(DefaultValue::Bool(true));

        assert_eq!(field.name, "enabled");
        assert!(field.required);
        assert!(field.has_default());
    }

    #[test]
    fn test_optional_field() {
        let field = FieldDef::optional("note", FieldType::String);

        assert!(!field.required);
        assert!(!field.has_default());
    }

    #[test]
    fn test_default_fit() {
        assert!(DefaultValue::Int(0).check_fits(FieldType::Float, true).is_ok());
        assert!(DefaultValue::Bool(true).check_fits(FieldType::String, false).is_err());
        assert!(DefaultValue::Null.check_fits(FieldType::String, true).is_err());
        assert!(DefaultValue::Null.check_fits(FieldType::String, false).is_ok());
        assert!(DefaultValue::Json("[".into()).check_fits(FieldType::Json, false).is_err());
    }

    #[test]
    fn test_resolve() {
        assert_eq!(DefaultValue::CurrentTimestamp.resolve(42), Value::Timestamp(42));
        assert_eq!(
            DefaultValue::Json("[]".into()).resolve(0),
            Value::Json(serde_json::json!([]))
        );
    }
}
