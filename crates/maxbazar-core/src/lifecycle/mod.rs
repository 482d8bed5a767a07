//! Row lifecycle: create, read, list, update and soft delete.

mod filter;
mod hierarchy;
mod repository;
mod store;

pub use filter::{Filter, Page, Pagination, Predicate};
pub(crate) use hierarchy::Hierarchy;
pub use repository::{
    fields_to_json, json_to_fields, json_to_value, to_fields, value_to_json, Entity, Repository,
    Stored,
};
pub use store::{Row, Store, ENVELOPE_FIELDS};
