//! Multi-tree write transactions.
//!
//! Every mutating operation runs inside one sled transaction spanning the
//! data, meta and index trees, so a write and its constraint checks commit or
//! fail together. sled retries the closure when it conflicts with a
//! concurrent transaction.

use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};

use super::key::{children_key, row_key, sequence_key};
use super::record::StoredRow;
use crate::error::Error;
use crate::value::Id;

/// Result type used inside a transaction closure.
pub type TxResult<T> = Result<T, ConflictableTransactionError<Error>>;

/// Abort the running transaction with a domain error.
pub fn abort<T>(error: Error) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(error))
}

/// Lift a plain result into a transaction result, aborting on error.
pub trait OrAbort<T> {
    /// Abort the transaction if `self` is an error.
    fn or_abort(self) -> TxResult<T>;
}

impl<T> OrAbort<T> for Result<T, Error> {
    fn or_abort(self) -> TxResult<T> {
        self.map_err(ConflictableTransactionError::Abort)
    }
}

/// Map the outcome of a finished transaction back to a plain result.
pub(crate) fn finish<T>(result: Result<T, TransactionError<Error>>) -> Result<T, Error> {
    result.map_err(|e| match e {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => Error::Storage(e),
    })
}

/// The trees visible to a running transaction.
pub struct Tx<'a> {
    /// Row envelopes keyed by entity and id.
    pub data: &'a TransactionalTree,
    /// Id sequences and tree child lists.
    pub meta: &'a TransactionalTree,
    /// Uniqueness group keys.
    pub unique: &'a TransactionalTree,
    /// Reverse reference entries.
    pub refs: &'a TransactionalTree,
}

impl Tx<'_> {
    /// Read a row, including soft-deleted ones.
    pub fn row(&self, entity: &str, id: Id) -> TxResult<Option<StoredRow>> {
        match self.data.get(row_key(entity, id))? {
            Some(bytes) => StoredRow::from_bytes(&bytes).map(Some).or_abort(),
            None => Ok(None),
        }
    }

    /// Read an active row.
    pub fn live_row(&self, entity: &str, id: Id) -> TxResult<Option<StoredRow>> {
        Ok(self.row(entity, id)?.filter(|row| !row.is_deleted()))
    }

    /// Write a row envelope.
    pub fn put_row(&self, entity: &str, row: &StoredRow) -> TxResult<()> {
        let bytes = row.to_bytes().or_abort()?;
        self.data.insert(row_key(entity, row.id()), bytes)?;
        Ok(())
    }

    /// Child ids recorded under a tree node, ascending.
    pub fn children(&self, entity: &str, parent: Id) -> TxResult<Vec<Id>> {
        let Some(bytes) = self.meta.get(children_key(entity, parent))? else {
            return Ok(Vec::new());
        };
        if bytes.len() % 8 != 0 {
            return abort(Error::InvalidData(format!(
                "child list of {entity} {parent} has {} bytes",
                bytes.len()
            )));
        }
        Ok(bytes
            .chunks_exact(8)
            .filter_map(Id::from_be_slice)
            .collect())
    }

    /// Add `child` to the child list of `parent`.
    pub fn link_child(&self, entity: &str, parent: Id, child: Id) -> TxResult<()> {
        let mut children = self.children(entity, parent)?;
        if let Err(at) = children.binary_search(&child) {
            children.insert(at, child);
            self.put_children(entity, parent, &children)?;
        }
        Ok(())
    }

    /// Remove `child` from the child list of `parent`.
    pub fn unlink_child(&self, entity: &str, parent: Id, child: Id) -> TxResult<()> {
        let mut children = self.children(entity, parent)?;
        if let Ok(at) = children.binary_search(&child) {
            children.remove(at);
            self.put_children(entity, parent, &children)?;
        }
        Ok(())
    }

    fn put_children(&self, entity: &str, parent: Id, children: &[Id]) -> TxResult<()> {
        let key = children_key(entity, parent);
        if children.is_empty() {
            self.meta.remove(key)?;
        } else {
            let bytes: Vec<u8> = children.iter().flat_map(|id| id.to_be_bytes()).collect();
            self.meta.insert(key, bytes)?;
        }
        Ok(())
    }

    /// Draw the next identifier from an entity's sequence.
    pub fn next_id(&self, entity: &str) -> TxResult<Id> {
        let key = sequence_key(entity);
        let current = match self.meta.get(&key)? {
            Some(bytes) => Id::from_be_slice(&bytes)
                .ok_or(Error::InvalidKey)
                .or_abort()?
                .get(),
            None => 0,
        };
        let next = Id(current + 1);
        self.meta.insert(key, &next.to_be_bytes())?;
        Ok(next)
    }
}
