//! Maxbazar Core - relational entity model of the Maxbazar marketplace.
//!
//! This crate provides the entity registry, the constraint engine, the
//! soft-delete lifecycle store and the category tree, backed by sled.

pub mod catalog;
pub mod category;
pub mod constraint;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod storage;
pub mod value;

pub use catalog::{
    Catalog, ConstraintDef, DefaultValue, EntityDef, EntityRegistry, FieldDef, FieldType,
    SchemaBundle,
};
pub use category::CategoryTree;
pub use constraint::{ConstraintEngine, Dependent};
pub use error::{Error, FieldViolation, SchemaError};
pub use lifecycle::{Entity, Filter, Page, Pagination, Predicate, Repository, Row, Store, Stored};
pub use model::marketplace_registry;
pub use storage::{StorageConfig, StorageEngine};
pub use value::{Fields, Id, Value};

