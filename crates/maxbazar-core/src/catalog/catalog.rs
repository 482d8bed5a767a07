//! Persisted schema history of a store.
//!
//! Each distinct registry shape that opened the store is kept under its
//! version number, so the data on disk can always be traced to the
//! definitions that wrote it.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use sled::{Db, Tree};
use tracing::info;

use super::SchemaBundle;
use crate::error::Error;

const SCHEMA_TREE: &str = "catalog:schemas";
const META_TREE: &str = "catalog:meta";

const CURRENT_VERSION_KEY: &[u8] = b"current_version";

/// Schema versions recorded in a store.
pub struct Catalog {
    versions: Tree,
    meta: Tree,
    current_version: AtomicU64,
    current: RwLock<Option<SchemaBundle>>,
}

impl Catalog {
    /// Load the catalog kept in `db`, creating its trees on first use.
    pub fn open(db: &Db) -> Result<Self, Error> {
        let versions = db.open_tree(SCHEMA_TREE)?;
        let meta = db.open_tree(META_TREE)?;

        let version = meta
            .get(CURRENT_VERSION_KEY)?
            .map(|bytes| decode_version(&bytes))
            .transpose()?
            .unwrap_or(0);
        let current = match version {
            0 => None,
            v => Some(read_bundle(&versions, v)?.ok_or_else(|| {
                Error::InvalidData(format!("catalog points at missing schema version {v}"))
            })?),
        };

        Ok(Self {
            versions,
            meta,
            current_version: AtomicU64::new(version),
            current: RwLock::new(current),
        })
    }

    /// Version in effect. Zero until a schema is recorded.
    pub fn current_version(&self) -> u64 {
        self.current_version.load(Ordering::SeqCst)
    }

    pub fn current_schema(&self) -> Option<SchemaBundle> {
        self.current.read().clone()
    }

    pub fn schema_at_version(&self, version: u64) -> Result<Option<SchemaBundle>, Error> {
        read_bundle(&self.versions, version)
    }

    /// Record `bundle` as the next version and make it current.
    pub fn apply_schema(&self, mut bundle: SchemaBundle) -> Result<u64, Error> {
        let version = self.current_version() + 1;
        bundle.version = version;

        self.versions.insert(version.to_be_bytes(), bundle.encode()?)?;
        self.meta.insert(CURRENT_VERSION_KEY, &version.to_be_bytes())?;

        self.current_version.store(version, Ordering::SeqCst);
        *self.current.write() = Some(bundle);
        Ok(version)
    }

    /// Record `bundle` only if it differs from the current schema.
    ///
    /// Returns the version in effect afterwards.
    pub fn ensure_schema(&self, bundle: SchemaBundle) -> Result<u64, Error> {
        let diff = match self.current.read().as_ref() {
            Some(current) => {
                let diff = current.diff(&bundle);
                if diff.is_empty() {
                    return Ok(self.current_version());
                }
                Some(diff)
            }
            None => None,
        };

        let version = self.apply_schema(bundle)?;
        match diff {
            Some(diff) => info!(
                version,
                added = ?diff.added,
                removed = ?diff.removed,
                changed = ?diff.changed,
                "schema changed"
            ),
            None => info!(version, "schema recorded"),
        }
        Ok(version)
    }

    /// Every recorded version, oldest first.
    pub fn list_versions(&self) -> Result<Vec<u64>, Error> {
        self.versions
            .iter()
            .keys()
            .map(|key| decode_version(&key?))
            .collect()
    }

    pub fn flush(&self) -> Result<(), Error> {
        self.versions.flush()?;
        self.meta.flush()?;
        Ok(())
    }
}

fn read_bundle(versions: &Tree, version: u64) -> Result<Option<SchemaBundle>, Error> {
    versions
        .get(version.to_be_bytes())?
        .map(|bytes| SchemaBundle::decode(&bytes))
        .transpose()
}

fn decode_version(bytes: &[u8]) -> Result<u64, Error> {
    let buf: [u8; 8] = bytes.try_into().map_err(|_| Error::InvalidKey)?;
    Ok(u64::from_be_bytes(buf))
}
