//! Reverse index of foreign key references.
//!
//! Key format:
//! `target_entity\0target_id(8)source_entity\0field\0source_id(8)` -> empty
//!
//! The fixed-width target id makes `target_entity\0target_id` an exact scan
//! prefix for the rows pointing at one target.

use crate::error::Error;
use crate::storage::key::SEPARATOR;
use crate::storage::{Tx, TxResult};
use crate::value::Id;

/// A live row holding a foreign key to another row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Dependent {
    /// Entity of the referencing row.
    pub entity: String,
    /// Foreign key field on the referencing row.
    pub field: String,
    /// Referencing row.
    pub id: Id,
}

/// Scan prefix selecting every reference to one target row.
pub fn target_prefix(target_entity: &str, target_id: Id) -> Vec<u8> {
    let mut key = Vec::with_capacity(target_entity.len() + 9);
    key.extend_from_slice(target_entity.as_bytes());
    key.push(SEPARATOR);
    key.extend_from_slice(&target_id.to_be_bytes());
    key
}

fn entry_key(target_entity: &str, target_id: Id, source: &str, field: &str, id: Id) -> Vec<u8> {
    let mut key = target_prefix(target_entity, target_id);
    key.extend_from_slice(source.as_bytes());
    key.push(SEPARATOR);
    key.extend_from_slice(field.as_bytes());
    key.push(SEPARATOR);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

/// Decode an entry key found under `prefix`.
pub fn decode_entry(prefix: &[u8], key: &[u8]) -> Result<Dependent, Error> {
    let rest = key.strip_prefix(prefix).ok_or(Error::InvalidKey)?;
    let split = rest.len().checked_sub(8).ok_or(Error::InvalidKey)?;
    let (names, id) = rest.split_at(split);
    let id = Id::from_be_slice(id).ok_or(Error::InvalidKey)?;

    let mut parts = names.split(|b| *b == SEPARATOR);
    let mut next = || {
        parts
            .next()
            .and_then(|p| std::str::from_utf8(p).ok())
            .map(String::from)
            .ok_or(Error::InvalidKey)
    };
    let entity = next()?;
    let field = next()?;

    Ok(Dependent { entity, field, id })
}

/// Record that `source.field` of row `id` points at `target_id`.
pub fn insert(
    tx: &Tx<'_>,
    target_entity: &str,
    target_id: Id,
    source: &str,
    field: &str,
    id: Id,
) -> TxResult<()> {
    tx.refs
        .insert(entry_key(target_entity, target_id, source, field, id), &b""[..])?;
    Ok(())
}

/// Drop the entry written by [`insert`].
pub fn remove(
    tx: &Tx<'_>,
    target_entity: &str,
    target_id: Id,
    source: &str,
    field: &str,
    id: Id,
) -> TxResult<()> {
    tx.refs
        .remove(entry_key(target_entity, target_id, source, field, id))?;
    Ok(())
}
