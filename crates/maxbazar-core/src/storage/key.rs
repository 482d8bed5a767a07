//! Row key encoding.
//!
//! Key format: `[entity name][0x00][id (8 bytes, big-endian)]`
//!
//! Big-endian ids keep a prefix scan over one entity in id order.

use chrono::Utc;

use crate::value::Id;

/// Separator between key components.
pub const SEPARATOR: u8 = 0;

/// Prefix shared by all rows of an entity.
pub fn entity_prefix(entity: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(entity.len() + 1);
    key.extend_from_slice(entity.as_bytes());
    key.push(SEPARATOR);
    key
}

/// Key of a single row.
pub fn row_key(entity: &str, id: Id) -> Vec<u8> {
    let mut key = entity_prefix(entity);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

/// Meta-tree key holding an entity's id sequence.
pub fn sequence_key(entity: &str) -> Vec<u8> {
    let mut key = b"seq:".to_vec();
    key.extend_from_slice(entity.as_bytes());
    key
}

/// Meta-tree key holding the child ids of a tree node.
///
/// Roots have no parent and are not listed.
pub fn children_key(entity: &str, parent: Id) -> Vec<u8> {
    let mut key = b"tree:".to_vec();
    key.extend_from_slice(entity.as_bytes());
    key.push(SEPARATOR);
    key.extend_from_slice(&parent.to_be_bytes());
    key
}

/// Current time in microseconds since Unix epoch.
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp_micros()
}
