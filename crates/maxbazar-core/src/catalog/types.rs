//! Core type definitions for the catalog.

use rkyv::{Archive, Deserialize, Serialize};

use crate::value::Value;

/// Field data types supported by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum FieldType {
    /// Boolean value.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit floating point.
    Float,
    /// UTF-8 string.
    String,
    /// Timestamp (microseconds since Unix epoch).
    Timestamp,
    /// Row identifier, used by foreign keys.
    Id,
    /// Opaque JSON document.
    Json,
}

impl FieldType {
    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Int | FieldType::Float)
    }

    /// Check whether a non-null value can be stored in a field of this type.
    ///
    /// Integers are accepted by float fields; nothing else is coerced.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (FieldType::Bool, Value::Bool(_))
                | (FieldType::Int, Value::Int(_))
                | (FieldType::Float, Value::Float(_) | Value::Int(_))
                | (FieldType::String, Value::String(_))
                | (FieldType::Timestamp, Value::Timestamp(_))
                | (FieldType::Id, Value::Id(_))
                | (FieldType::Json, Value::Json(_))
        )
    }

    /// Type name used in messages.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Bool => "Bool",
            FieldType::Int => "Int",
            FieldType::Float => "Float",
            FieldType::String => "String",
            FieldType::Timestamp => "Timestamp",
            FieldType::Id => "Id",
            FieldType::Json => "Json",
        }
    }
}
