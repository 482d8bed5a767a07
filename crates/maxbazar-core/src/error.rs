//! Core error types.

use std::fmt;

use thiserror::Error;

use crate::value::Id;

/// Core model errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A candidate record failed required-field or type checks.
    #[error("validation failed for {entity}: {}", format_violations(.violations))]
    Validation {
        /// Entity being written.
        entity: String,
        /// Every violation found, in field declaration order.
        violations: Vec<FieldViolation>,
    },

    /// A uniqueness group key is already held by a live row.
    #[error("{entity} violates unique group {group}: key held by row {conflicting_id}")]
    Conflict {
        /// Entity being written.
        entity: String,
        /// Name of the violated uniqueness group.
        group: String,
        /// Row currently holding the key.
        conflicting_id: Id,
    },

    /// A foreign key points at a missing or soft-deleted row.
    #[error("{entity}.{field} references missing {referenced_entity} row {referenced_id}")]
    DanglingReference {
        /// Entity being written.
        entity: String,
        /// Foreign key field.
        field: String,
        /// Entity the field points at.
        referenced_entity: String,
        /// Identifier that could not be resolved.
        referenced_id: Id,
    },

    /// The target row does not exist or is already soft-deleted.
    #[error("{entity} row {id} not found")]
    NotFound {
        /// Entity that was addressed.
        entity: String,
        /// Identifier that was addressed.
        id: Id,
    },

    /// Reparenting would introduce a loop into a hierarchy.
    #[error("attaching {entity} {child} under {parent} would create a cycle")]
    Cycle {
        /// Hierarchical entity.
        entity: String,
        /// Node being moved.
        child: Id,
        /// Requested parent.
        parent: Id,
    },

    /// Entity definitions are inconsistent.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Key decoding error.
    #[error("invalid key format")]
    InvalidKey,

    /// Invalid data format.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Whether the caller can correct the input and retry.
    ///
    /// Schema and infrastructure errors are not recoverable by the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Validation { .. }
                | Error::Conflict { .. }
                | Error::DanglingReference { .. }
                | Error::NotFound { .. }
                | Error::Cycle { .. }
        )
    }

    pub(crate) fn not_found(entity: &str, id: Id) -> Self {
        Error::NotFound {
            entity: entity.to_string(),
            id,
        }
    }
}

/// A single problem found while validating a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Offending field.
    pub field: String,
    /// Human-readable reason.
    pub reason: String,
}

impl FieldViolation {
    /// Create a new violation.
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

fn format_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Programming-time misconfiguration of entity definitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The same entity name was defined twice.
    #[error("entity {0} is already defined")]
    DuplicateEntity(String),

    /// A field is declared twice.
    #[error("{entity}.{field} is declared more than once")]
    DuplicateField {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
    },

    /// A constraint names a field the entity does not declare.
    #[error("constraint {constraint} on {entity} references unknown field {field}")]
    UnknownField {
        /// Entity carrying the constraint.
        entity: String,
        /// Constraint name.
        constraint: String,
        /// Missing field.
        field: String,
    },

    /// A foreign key targets an entity that has not been defined.
    #[error("{entity}.{field} references undefined entity {target}")]
    UnknownEntity {
        /// Entity carrying the foreign key.
        entity: String,
        /// Foreign key field.
        field: String,
        /// Undefined target.
        target: String,
    },

    /// Two declarations of one field disagree on its default.
    #[error("{entity}.{field} declares conflicting defaults")]
    ConflictingDefaults {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
    },

    /// A default value cannot populate the field it is attached to.
    #[error("{entity}.{field} default is incompatible: {reason}")]
    IncompatibleDefault {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
        /// Why the default does not fit.
        reason: String,
    },

    /// A constraint is structurally invalid.
    #[error("constraint {constraint} on {entity} is invalid: {reason}")]
    InvalidConstraint {
        /// Entity carrying the constraint.
        entity: String,
        /// Constraint name.
        constraint: String,
        /// What is wrong.
        reason: String,
    },

    /// An operation addressed an entity the registry does not know.
    #[error("entity {0} is not defined")]
    UndefinedEntity(String),
}
