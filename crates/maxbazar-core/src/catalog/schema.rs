//! Frozen, versioned copy of a registry as persisted in the catalog.

use rkyv::{Archive, Deserialize, Serialize};

use super::EntityDef;
use crate::error::Error;

/// Every entity definition of one schema version, in definition order.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct SchemaBundle {
    /// Catalog version; assigned when the bundle is applied.
    pub version: u64,
    /// When the bundle was frozen, microseconds since Unix epoch.
    pub created_at: i64,
    /// Definitions, referenced entities before the entities referencing them.
    pub entities: Vec<EntityDef>,
}

/// Entity-level difference between two bundles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

impl SchemaDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

impl SchemaBundle {
    /// Freeze `entities` at `version`, stamped with the current time.
    pub fn new(version: u64, entities: Vec<EntityDef>) -> Self {
        Self {
            version,
            created_at: crate::storage::key::current_timestamp(),
            entities,
        }
    }

    /// Look up a definition by entity name.
    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Entity names in definition order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(|e| e.name.as_str())
    }

    /// What `next` adds, drops or redefines relative to `self`.
    ///
    /// Version, timestamp and definition order are not compared.
    pub fn diff(&self, next: &SchemaBundle) -> SchemaDiff {
        let mut diff = SchemaDiff::default();
        for entity in &next.entities {
            match self.entity(&entity.name) {
                None => diff.added.push(entity.name.clone()),
                Some(current) if current != entity => diff.changed.push(entity.name.clone()),
                Some(_) => {}
            }
        }
        diff.removed = self
            .names()
            .filter(|name| next.entity(name).is_none())
            .map(String::from)
            .collect();
        diff
    }

    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|bytes| bytes.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}
