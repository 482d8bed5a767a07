//! Soft-delete lifecycle store.
//!
//! Every write validates the record, checks constraints and persists the row
//! inside one sled transaction. Rows are never physically removed; soft
//! delete stamps `deleted_at` and releases the row's uniqueness keys.
//!
//! For entities declaring a hierarchy the same transaction also keeps the
//! derived depth and leaf-cache fields of every affected node current.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use super::filter::{Filter, Page, Pagination};
use super::hierarchy::Hierarchy;
use crate::catalog::{Catalog, ConstraintDef, EntityDef, EntityRegistry, SchemaBundle};
use crate::constraint::{ConstraintEngine, Dependent};
use crate::error::{Error, FieldViolation};
use crate::storage::key::current_timestamp;
use crate::storage::{
    abort, codec, OrAbort, StorageConfig, StorageEngine, StoredRow, Tx, TxResult,
};
use crate::value::{Fields, Id, Value};

/// Envelope field names. They are managed by the store and cannot be
/// written by callers.
pub const ENVELOPE_FIELDS: [&str; 4] = ["id", "created_at", "updated_at", "deleted_at"];

/// A row as returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Surrogate identifier.
    pub id: Id,
    /// Creation time, microseconds since Unix epoch.
    pub created_at: i64,
    /// Last modification time.
    pub updated_at: i64,
    /// Soft-delete time, if deleted.
    pub deleted_at: Option<i64>,
    /// Field values.
    pub fields: Fields,
}

impl Row {
    fn decode(row: &StoredRow) -> Result<Self, Error> {
        Ok(Self {
            id: row.id(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
            fields: codec::decode_fields(&row.data)?,
        })
    }

    /// Whether this row has been soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// The entity store: registry, constraint engine and storage together.
///
/// `Store` is `Send + Sync`; share it across threads with `Arc`.
pub struct Store {
    storage: StorageEngine,
    catalog: Catalog,
    registry: EntityRegistry,
    schema_version: u64,
}

impl Store {
    /// Open a store and record the registry's schema in its catalog.
    ///
    /// Rows already on disk are not re-indexed when the schema changes. A
    /// uniqueness group added or redefined since they were written is only
    /// enforced among rows written afterwards; each such group is logged as a
    /// warning.
    pub fn open(config: StorageConfig, registry: EntityRegistry) -> Result<Self, Error> {
        let storage = StorageEngine::open(&config)?;
        let catalog = Catalog::open(storage.db())?;

        let previous = catalog.current_schema();
        let schema_version = catalog.ensure_schema(registry.to_bundle(0))?;
        if let Some(previous) = previous.filter(|p| p.version != schema_version) {
            for (entity, group) in unindexed_groups(&previous, &registry) {
                warn!(%entity, %group, "unique group not enforced against existing rows");
            }
        }

        Ok(Self {
            storage,
            catalog,
            registry,
            schema_version,
        })
    }

    /// Open a temporary in-memory store.
    pub fn temporary(registry: EntityRegistry) -> Result<Self, Error> {
        Self::open(StorageConfig::temporary(), registry)
    }

    /// The registry this store enforces.
    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// The persisted schema catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Version of the schema currently in effect.
    pub fn schema_version(&self) -> u64 {
        self.schema_version
    }

    fn constraints(&self) -> ConstraintEngine<'_> {
        ConstraintEngine::new(&self.registry)
    }

    /// Insert a new row and return its identifier.
    ///
    /// Defaults are applied before validation; constraint checks and the
    /// insert are atomic. Derived hierarchy fields are computed, not taken
    /// from `record`.
    pub fn create(&self, entity: &str, record: Fields) -> Result<Id, Error> {
        let def = self.registry.require(entity)?;
        reject_envelope(entity, &record)?;

        let now = current_timestamp();
        let mut record = record;
        record.retain(|name, _| !def.is_derived(name));
        self.registry.apply_defaults(entity, &mut record, now)?;
        self.registry.coerce(entity, &mut record)?;
        self.registry.validate(entity, &record)?;

        let id = self
            .storage
            .transaction(|tx| self.create_in(tx, def, &record, now))?;

        debug!(entity, %id, "row created");
        Ok(id)
    }

    fn create_in(
        &self,
        tx: &Tx<'_>,
        def: &EntityDef,
        record: &Fields,
        now: i64,
    ) -> TxResult<Id> {
        let mut record = record.clone();
        let tree = Hierarchy::new(tx, def);
        if let Some(tree) = &tree {
            // An inactive parent is reported by the reference check.
            let depth = tree.depth_under(tree.parent_of(&record))?.unwrap_or(0);
            record.insert(tree.fields().depth.to_string(), Value::Int(depth));
        }

        let constraints = self.constraints();
        constraints.check_unique(tx, def, &record, None)?;
        constraints.check_references(tx, def, &record, None)?;

        let id = tx.next_id(&def.name)?;
        if let Some(tree) = &tree {
            // A new node has no children yet.
            let enabled = record.get(tree.fields().enabled) == Some(&Value::Bool(true));
            let leaves = if enabled { BTreeSet::from([id]) } else { BTreeSet::new() };
            record.insert(tree.fields().leaves.to_string(), Hierarchy::cache_value(&leaves));
        }

        let data = codec::encode_fields(&record).or_abort()?;
        tx.put_row(&def.name, &StoredRow::new(id, data, now))?;
        constraints.index(tx, def, id, &record)?;

        if let Some(tree) = &tree {
            if let Some(parent) = tree.parent_of(&record) {
                tx.link_child(&def.name, parent, id)?;
                self.refresh_upward(tx, def, tree, parent)?;
            }
        }
        Ok(id)
    }

    /// Fetch an active row.
    pub fn get(&self, entity: &str, id: Id) -> Result<Row, Error> {
        let row = self.get_with_deleted(entity, id)?;
        if row.is_deleted() {
            return Err(Error::not_found(entity, id));
        }
        Ok(row)
    }

    /// Fetch a row even if it has been soft-deleted.
    pub fn get_with_deleted(&self, entity: &str, id: Id) -> Result<Row, Error> {
        self.registry.require(entity)?;
        match self.storage.get_row(entity, id)? {
            Some(row) => Row::decode(&row),
            None => Err(Error::not_found(entity, id)),
        }
    }

    /// List active rows matching `filter`, ordered by id.
    pub fn list(
        &self,
        entity: &str,
        filter: &Filter,
        pagination: Pagination,
    ) -> Result<Page<Row>, Error> {
        let def = self.registry.require(entity)?;
        let unknown: Vec<FieldViolation> = filter
            .predicates()
            .iter()
            .map(|p| p.field())
            .filter(|f| def.get_field(f).is_none())
            .map(|f| FieldViolation::new(f, "unknown field in filter"))
            .collect();
        if !unknown.is_empty() {
            return Err(Error::Validation {
                entity: entity.to_string(),
                violations: unknown,
            });
        }

        let mut items = Vec::new();
        let mut total = 0;
        for stored in self.storage.scan_entity(entity) {
            let stored = stored?;
            if stored.is_deleted() {
                continue;
            }
            let row = Row::decode(&stored)?;
            if !filter.matches(&row.fields) {
                continue;
            }

            total += 1;
            let in_window = total > pagination.offset
                && pagination
                    .limit
                    .map_or(true, |limit| items.len() < limit);
            if in_window {
                items.push(row);
            }
        }

        Ok(Page { items, total })
    }

    /// Merge `patch` into an active row.
    ///
    /// The merged record is re-validated and its uniqueness keys and changed
    /// foreign keys re-checked. A null in the patch clears the field. Derived
    /// hierarchy fields in the patch are ignored; moving or toggling a node
    /// updates its subtree depths and the leaf caches of its old and new
    /// ancestors in the same transaction.
    pub fn update(&self, entity: &str, id: Id, patch: Fields) -> Result<Row, Error> {
        let def = self.registry.require(entity)?;
        reject_envelope(entity, &patch)?;

        let mut patch = patch;
        patch.retain(|name, _| !def.is_derived(name));

        let row = self
            .storage
            .transaction(|tx| self.update_in(tx, def, id, &patch))?;

        debug!(entity, %id, "row updated");
        Row::decode(&row)
    }

    fn update_in(
        &self,
        tx: &Tx<'_>,
        def: &EntityDef,
        id: Id,
        patch: &Fields,
    ) -> TxResult<StoredRow> {
        let Some(tree) = Hierarchy::new(tx, def) else {
            return self.apply(tx, def, id, patch);
        };
        let Some(current) = tree.node(id)? else {
            return abort(Error::not_found(&def.name, id));
        };

        let fields = tree.fields();
        let mut patch = patch.clone();
        let old_parent = tree.parent_of(&current);
        let new_parent = match patch.get(fields.parent) {
            Some(value) => value.as_id(),
            None => old_parent,
        };
        let moved = new_parent != old_parent;
        if moved {
            if let Some(depth) = tree.depth_under(new_parent)? {
                patch.insert(fields.depth.to_string(), Value::Int(depth));
            }
        }

        self.apply(tx, def, id, &patch)?;

        if moved {
            if let Some(old) = old_parent {
                tx.unlink_child(&def.name, old, id)?;
            }
            if let Some(new) = new_parent {
                tx.link_child(&def.name, new, id)?;
            }
            for (node, values, depth) in tree.expected_depths(id)? {
                if tree.depth_of(&values) != depth {
                    let patch = Fields::from([(fields.depth.to_string(), Value::Int(depth))]);
                    self.apply(tx, def, node, &patch)?;
                }
            }
            if let Some(old) = old_parent {
                self.refresh_upward(tx, def, &tree, old)?;
            }
        }
        if moved || patch.contains_key(fields.enabled) {
            self.refresh_upward(tx, def, &tree, id)?;
        }

        match tx.live_row(&def.name, id)? {
            Some(row) => Ok(row),
            None => abort(Error::not_found(&def.name, id)),
        }
    }

    /// Merge `patch` into one active row without hierarchy maintenance.
    fn apply(
        &self,
        tx: &Tx<'_>,
        def: &EntityDef,
        id: Id,
        patch: &Fields,
    ) -> TxResult<StoredRow> {
        let Some(mut row) = tx.live_row(&def.name, id)? else {
            return abort(Error::not_found(&def.name, id));
        };
        let previous = codec::decode_fields(&row.data).or_abort()?;

        let mut merged = previous.clone();
        merged.extend(patch.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.registry.coerce(&def.name, &mut merged).or_abort()?;
        self.registry.validate(&def.name, &merged).or_abort()?;

        let constraints = self.constraints();
        constraints.check_unique(tx, def, &merged, Some(id))?;
        constraints.check_references(tx, def, &merged, Some(&previous))?;
        constraints.check_acyclic(tx, def, id, &merged)?;

        constraints.unindex(tx, def, id, &previous)?;
        constraints.index(tx, def, id, &merged)?;

        row.data = codec::encode_fields(&merged).or_abort()?;
        row.updated_at = current_timestamp().max(row.updated_at + 1);
        tx.put_row(&def.name, &row)?;
        Ok(row)
    }

    /// Recompute the leaf cache of `start` and each of its ancestors.
    ///
    /// Returns how many caches changed.
    fn refresh_upward(
        &self,
        tx: &Tx<'_>,
        def: &EntityDef,
        tree: &Hierarchy<'_>,
        start: Id,
    ) -> TxResult<usize> {
        let mut written = 0;
        for node in std::iter::once(start).chain(tree.ancestors(start)?) {
            if self.refresh_node(tx, def, tree, node)? {
                written += 1;
            }
        }
        Ok(written)
    }

    /// Rewrite the leaf cache of one active node if it is stale.
    fn refresh_node(
        &self,
        tx: &Tx<'_>,
        def: &EntityDef,
        tree: &Hierarchy<'_>,
        id: Id,
    ) -> TxResult<bool> {
        let Some(node) = tree.node(id)? else {
            return Ok(false);
        };
        let leaves = tree.leaves(id)?;
        if tree.cache_matches(&node, &leaves) {
            return Ok(false);
        }

        let patch = Fields::from([(
            tree.fields().leaves.to_string(),
            Hierarchy::cache_value(&leaves),
        )]);
        self.apply(tx, def, id, &patch)?;
        Ok(true)
    }

    /// Rebuild child lists, depths and leaf caches of the active `nodes`.
    ///
    /// Nodes whose parent is inactive are treated as roots and keep their
    /// depth. Returns how many rows were rewritten.
    pub(crate) fn rebuild_hierarchy(
        &self,
        tx: &Tx<'_>,
        def: &EntityDef,
        tree: &Hierarchy<'_>,
        nodes: &[Id],
    ) -> TxResult<usize> {
        let depth_field = tree.fields().depth;
        let mut written = BTreeSet::new();
        let mut roots = Vec::new();
        for &id in nodes {
            let Some(node) = tree.node(id)? else {
                continue;
            };
            match tree.parent_of(&node) {
                Some(parent) => {
                    tx.link_child(&def.name, parent, id)?;
                    if tree.node(parent)?.is_none() {
                        roots.push(id);
                    }
                }
                None => {
                    roots.push(id);
                    if tree.depth_of(&node) != 0 {
                        let patch = Fields::from([(depth_field.to_string(), Value::Int(0))]);
                        self.apply(tx, def, id, &patch)?;
                        written.insert(id);
                    }
                }
            }
        }

        for root in roots {
            for (node, values, depth) in tree.expected_depths(root)? {
                if tree.depth_of(&values) != depth {
                    let patch = Fields::from([(depth_field.to_string(), Value::Int(depth))]);
                    self.apply(tx, def, node, &patch)?;
                    written.insert(node);
                }
            }
        }
        for &id in nodes {
            if self.refresh_node(tx, def, tree, id)? {
                written.insert(id);
            }
        }
        Ok(written.len())
    }

    /// Mark an active row deleted and release its uniqueness keys.
    ///
    /// Rows referencing it are left untouched; see [`dependents`](Self::dependents).
    /// A deleted tree node drops out of its ancestors' leaf caches.
    pub fn soft_delete(&self, entity: &str, id: Id) -> Result<(), Error> {
        let def = self.registry.require(entity)?;

        self.storage.transaction(|tx| {
            let Some(mut row) = tx.live_row(entity, id)? else {
                return abort(Error::not_found(entity, id));
            };
            let fields = codec::decode_fields(&row.data).or_abort()?;
            self.constraints().unindex(tx, def, id, &fields)?;

            let now = current_timestamp().max(row.updated_at + 1);
            row.deleted_at = Some(now);
            row.updated_at = now;
            tx.put_row(entity, &row)?;

            if let Some(tree) = Hierarchy::new(tx, def) {
                if let Some(parent) = tree.parent_of(&fields) {
                    tx.unlink_child(entity, parent, id)?;
                    self.refresh_upward(tx, def, &tree, parent)?;
                }
            }
            Ok(())
        })?;

        debug!(entity, %id, "row soft-deleted");
        Ok(())
    }

    /// Active rows holding a foreign key to `entity` row `id`.
    pub fn dependents(&self, entity: &str, id: Id) -> Result<Vec<Dependent>, Error> {
        self.constraints().dependents(&self.storage, entity, id)
    }

    /// Run `f` in one transaction over the store's trees.
    pub(crate) fn transaction<F, R>(&self, f: F) -> Result<R, Error>
    where
        F: Fn(&Tx<'_>) -> TxResult<R>,
    {
        self.storage.transaction(f)
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.storage.flush()?;
        self.catalog.flush()
    }
}

/// Unique groups of `registry` that rows written under `previous` were never
/// indexed for, as `(entity, group)` pairs.
fn unindexed_groups(previous: &SchemaBundle, registry: &EntityRegistry) -> Vec<(String, String)> {
    let mut groups = Vec::new();
    for name in registry.entity_names() {
        let (Some(def), Some(old)) = (registry.get(name), previous.entity(name)) else {
            continue;
        };
        for constraint in &def.constraints {
            let is_unique = matches!(constraint, ConstraintDef::Unique { .. });
            if is_unique && !old.constraints.contains(constraint) {
                groups.push((name.to_string(), constraint.name().to_string()));
            }
        }
    }
    groups
}

fn reject_envelope(entity: &str, record: &Fields) -> Result<(), Error> {
    let violations: Vec<FieldViolation> = ENVELOPE_FIELDS
        .iter()
        .filter(|name| record.contains_key(**name))
        .map(|name| FieldViolation::new(*name, "envelope fields are managed by the store"))
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation {
            entity: entity.to_string(),
            violations,
        })
    }
}
