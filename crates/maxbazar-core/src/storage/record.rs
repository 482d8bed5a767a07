//! Stored row envelope.

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::Error;
use crate::value::Id;

/// A row as persisted in the data tree: envelope plus encoded fields.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct StoredRow {
    /// Surrogate identifier.
    pub id: u64,

    /// Creation timestamp in microseconds since Unix epoch.
    pub created_at: i64,

    /// Last modification timestamp.
    pub updated_at: i64,

    /// Soft-delete marker. None means the row is active.
    pub deleted_at: Option<i64>,

    /// Field values encoded with [`super::codec::encode_fields`].
    pub data: Vec<u8>,
}

impl StoredRow {
    /// Create an active row stamped with `now`.
    pub fn new(id: Id, data: Vec<u8>, now: i64) -> Self {
        Self {
            id: id.get(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            data,
        }
    }

    /// Row identifier.
    pub fn id(&self) -> Id {
        Id(self.id)
    }

    /// Whether the row has been soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Serialize the row to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a row from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}
