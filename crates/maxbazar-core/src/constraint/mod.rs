//! Constraint enforcement.
//!
//! - Uniqueness groups, scoped to active rows
//! - Foreign keys, which must point at active rows when written
//! - Acyclic parent links for hierarchical entities

mod engine;
mod reference_index;
mod unique_index;

pub use engine::ConstraintEngine;
pub use reference_index::Dependent;
