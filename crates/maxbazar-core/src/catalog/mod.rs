//! Entity catalog.
//!
//! Declares entity shapes (fields, defaults, uniqueness groups, foreign keys,
//! presence rules), validates candidate records against them and persists the
//! frozen schema alongside the data.

mod catalog;
mod constraint;
mod entity;
mod field;
mod registry;
mod schema;
mod types;

pub use catalog::Catalog;
pub use constraint::ConstraintDef;
pub use entity::{EntityDef, ForeignKeyRef, HierarchyRef, UniqueGroup};
pub use field::{DefaultValue, FieldDef};
pub use registry::EntityRegistry;
pub use schema::{SchemaBundle, SchemaDiff};
pub use types::FieldType;
