//! Storage engine implementation.

use sled::transaction::Transactional;
use sled::{Db, Tree};
use tracing::info;

use super::key::{entity_prefix, row_key};
use super::transaction::{finish, Tx, TxResult};
use super::{StorageConfig, StoredRow};
use crate::error::Error;
use crate::value::Id;

/// Tree name for row envelopes.
const DATA_TREE: &str = "data";

/// Tree name for id sequences.
const META_TREE: &str = "meta";

/// Tree name for uniqueness group keys.
const UNIQUE_TREE: &str = "index:unique";

/// Tree name for reverse reference entries.
const REFS_TREE: &str = "index:refs";

/// The storage engine wrapping sled.
pub struct StorageEngine {
    db: Db,
    data_tree: Tree,
    meta_tree: Tree,
    unique_tree: Tree,
    refs_tree: Tree,
}

impl StorageEngine {
    /// Open or create a storage engine with the given configuration.
    pub fn open(config: &StorageConfig) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;
        let engine = Self {
            data_tree: db.open_tree(DATA_TREE)?,
            meta_tree: db.open_tree(META_TREE)?,
            unique_tree: db.open_tree(UNIQUE_TREE)?,
            refs_tree: db.open_tree(REFS_TREE)?,
            db,
        };

        info!(
            path = %config.path.display(),
            temporary = config.temporary,
            recovered = engine.was_recovered(),
            "storage opened"
        );
        Ok(engine)
    }

    /// The underlying database, for components that keep their own trees.
    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Check if the database was recovered from a previous run.
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }

    /// Run `f` atomically across the data, meta and index trees.
    pub fn transaction<F, R>(&self, f: F) -> Result<R, Error>
    where
        F: Fn(&Tx<'_>) -> TxResult<R>,
    {
        finish(
            (
                &self.data_tree,
                &self.meta_tree,
                &self.unique_tree,
                &self.refs_tree,
            )
                .transaction(|(data, meta, unique, refs)| {
                    f(&Tx {
                        data,
                        meta,
                        unique,
                        refs,
                    })
                }),
        )
    }

    /// Read a row, including soft-deleted ones.
    pub fn get_row(&self, entity: &str, id: Id) -> Result<Option<StoredRow>, Error> {
        match self.data_tree.get(row_key(entity, id))? {
            Some(bytes) => Ok(Some(StoredRow::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Iterate all rows of an entity in id order, including soft-deleted ones.
    pub fn scan_entity(
        &self,
        entity: &str,
    ) -> impl Iterator<Item = Result<StoredRow, Error>> + '_ {
        self.data_tree
            .scan_prefix(entity_prefix(entity))
            .map(|item| {
                let (_, value) = item?;
                StoredRow::from_bytes(&value)
            })
    }

    /// Iterate reverse reference entries under `prefix`, yielding the raw
    /// entry keys.
    pub fn scan_refs(&self, prefix: &[u8]) -> impl Iterator<Item = Result<Vec<u8>, Error>> + '_ {
        self.refs_tree
            .scan_prefix(prefix)
            .keys()
            .map(|key| Ok(key?.to_vec()))
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }
}
