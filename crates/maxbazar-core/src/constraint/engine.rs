//! Constraint engine.
//!
//! Enforces uniqueness groups, foreign keys and parent-link acyclicity inside
//! the transaction that performs the write, and keeps the index trees in step
//! with the rows.

use std::collections::HashSet;

use super::reference_index::{self, Dependent};
use super::unique_index;
use crate::catalog::{EntityDef, EntityRegistry};
use crate::error::Error;
use crate::storage::{abort, codec, OrAbort, StorageEngine, Tx, TxResult};
use crate::value::{Fields, Id, Value};

/// Checks a candidate row against the stored state.
pub struct ConstraintEngine<'a> {
    registry: &'a EntityRegistry,
}

impl<'a> ConstraintEngine<'a> {
    /// Create a constraint engine over the given registry.
    pub fn new(registry: &'a EntityRegistry) -> Self {
        Self { registry }
    }

    /// Fail with a conflict if any uniqueness group key of `record` is held by
    /// an active row other than `exclude`.
    ///
    /// Groups are checked independently; the first violated group is reported.
    pub fn check_unique(
        &self,
        tx: &Tx<'_>,
        entity: &EntityDef,
        record: &Fields,
        exclude: Option<Id>,
    ) -> TxResult<()> {
        for group in entity.unique_groups() {
            let Some(key) = unique_index::group_key(&entity.name, &group, record).or_abort()?
            else {
                continue;
            };

            match unique_index::lookup(tx, &key)? {
                Some(holder) if Some(holder) != exclude => {
                    return abort(Error::Conflict {
                        entity: entity.name.clone(),
                        group: group.name.to_string(),
                        conflicting_id: holder,
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Fail with a dangling reference if any non-null foreign key of `record`
    /// points at a missing or soft-deleted row.
    ///
    /// With `previous` set, only foreign keys whose value changed are checked.
    pub fn check_references(
        &self,
        tx: &Tx<'_>,
        entity: &EntityDef,
        record: &Fields,
        previous: Option<&Fields>,
    ) -> TxResult<()> {
        for fk in entity.foreign_keys() {
            let Some(target) = record.get(fk.field).and_then(Value::as_id) else {
                continue;
            };
            let unchanged = previous
                .and_then(|p| p.get(fk.field))
                .and_then(Value::as_id)
                == Some(target);
            if unchanged {
                continue;
            }

            if tx.live_row(fk.references, target)?.is_none() {
                return abort(Error::DanglingReference {
                    entity: entity.name.clone(),
                    field: fk.field.to_string(),
                    referenced_entity: fk.references.to_string(),
                    referenced_id: target,
                });
            }
        }
        Ok(())
    }

    /// Fail with a cycle error if giving row `id` the parent named in `record`
    /// would make it its own ancestor.
    pub fn check_acyclic(
        &self,
        tx: &Tx<'_>,
        entity: &EntityDef,
        id: Id,
        record: &Fields,
    ) -> TxResult<()> {
        let Some(link) = entity.parent_link() else {
            return Ok(());
        };
        let Some(parent) = record.get(link.field).and_then(Value::as_id) else {
            return Ok(());
        };

        let cycle = || Error::Cycle {
            entity: entity.name.clone(),
            child: id,
            parent,
        };

        let mut seen = HashSet::new();
        let mut cursor = Some(parent);
        while let Some(node) = cursor {
            if node == id || !seen.insert(node) {
                return abort(cycle());
            }
            cursor = match tx.row(&entity.name, node)? {
                Some(row) => codec::decode_fields(&row.data)
                    .or_abort()?
                    .get(link.field)
                    .and_then(Value::as_id),
                None => None,
            };
        }
        Ok(())
    }

    /// Write the uniqueness keys and reference entries of an active row.
    pub fn index(&self, tx: &Tx<'_>, entity: &EntityDef, id: Id, record: &Fields) -> TxResult<()> {
        for group in entity.unique_groups() {
            if let Some(key) = unique_index::group_key(&entity.name, &group, record).or_abort()? {
                unique_index::insert(tx, key, id)?;
            }
        }
        for fk in entity.foreign_keys() {
            if let Some(target) = record.get(fk.field).and_then(Value::as_id) {
                reference_index::insert(tx, fk.references, target, &entity.name, fk.field, id)?;
            }
        }
        Ok(())
    }

    /// Remove everything [`index`](Self::index) wrote for this row state.
    pub fn unindex(
        &self,
        tx: &Tx<'_>,
        entity: &EntityDef,
        id: Id,
        record: &Fields,
    ) -> TxResult<()> {
        for group in entity.unique_groups() {
            if let Some(key) = unique_index::group_key(&entity.name, &group, record).or_abort()? {
                unique_index::remove(tx, &key, id)?;
            }
        }
        for fk in entity.foreign_keys() {
            if let Some(target) = record.get(fk.field).and_then(Value::as_id) {
                reference_index::remove(tx, fk.references, target, &entity.name, fk.field, id)?;
            }
        }
        Ok(())
    }

    /// Active rows whose foreign keys point at `entity` row `id`.
    pub fn dependents(
        &self,
        storage: &StorageEngine,
        entity: &str,
        id: Id,
    ) -> Result<Vec<Dependent>, Error> {
        self.registry.require(entity)?;
        let prefix = reference_index::target_prefix(entity, id);

        let mut dependents = storage
            .scan_refs(&prefix)
            .map(|key| reference_index::decode_entry(&prefix, &key?))
            .collect::<Result<Vec<_>, _>>()?;
        dependents.sort();
        Ok(dependents)
    }
}
