//! Storage layer.
//!
//! A sled-backed row store: rkyv envelopes in a data tree, per-entity id
//! sequences, and the index trees used by the constraint engine.

mod config;
mod engine;
mod record;
mod transaction;

pub mod codec;
pub mod key;

pub use config::StorageConfig;
pub use engine::StorageEngine;
pub use record::StoredRow;
pub use transaction::{abort, OrAbort, Tx, TxResult};
