//! Secondary index for enforcing uniqueness groups.
//!
//! Key format: `entity\0group\0<encoded values>` -> `id (8 bytes, big-endian)`
//!
//! Only active rows hold entries; soft delete removes them, so a freed key
//! can be claimed again.

use crate::catalog::UniqueGroup;
use crate::error::Error;
use crate::storage::codec::encode_value;
use crate::storage::key::SEPARATOR;
use crate::storage::{Tx, TxResult};
use crate::value::{Fields, Id, Value};

/// Derive the index key for one group of a record.
///
/// Returns `None` when the group does not bind this record: a component is
/// null and the group treats nulls as distinct.
pub fn group_key(
    entity: &str,
    group: &UniqueGroup<'_>,
    record: &Fields,
) -> Result<Option<Vec<u8>>, Error> {
    let mut key = Vec::new();
    key.extend_from_slice(entity.as_bytes());
    key.push(SEPARATOR);
    key.extend_from_slice(group.name.as_bytes());
    key.push(SEPARATOR);

    for field in group.fields {
        let value = record.get(field).unwrap_or(&Value::Null);
        if value.is_null() && group.nulls_distinct {
            return Ok(None);
        }
        encode_value(&mut key, value)?;
    }

    Ok(Some(key))
}

/// Look up the row currently holding `key`.
pub fn lookup(tx: &Tx<'_>, key: &[u8]) -> TxResult<Option<Id>> {
    Ok(tx
        .unique
        .get(key)?
        .and_then(|bytes| Id::from_be_slice(&bytes)))
}

/// Claim `key` for row `id`.
pub fn insert(tx: &Tx<'_>, key: Vec<u8>, id: Id) -> TxResult<()> {
    tx.unique.insert(key, &id.to_be_bytes())?;
    Ok(())
}

/// Release `key` if it is held by row `id`.
pub fn remove(tx: &Tx<'_>, key: &[u8], id: Id) -> TxResult<()> {
    if lookup(tx, key)? == Some(id) {
        tx.unique.remove(key)?;
    }
    Ok(())
}
