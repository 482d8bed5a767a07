//! Tree reads for entities declaring a hierarchy.
//!
//! All reads go through the running transaction, so depth and leaf-cache
//! maintenance observes the same state the write commits against.

use std::collections::{BTreeSet, HashSet, VecDeque};

use crate::catalog::{EntityDef, HierarchyRef};
use crate::storage::{codec, OrAbort, Tx, TxResult};
use crate::value::{Fields, Id, Value};

/// One entity's forest, viewed through a transaction.
pub(crate) struct Hierarchy<'a> {
    tx: &'a Tx<'a>,
    entity: &'a str,
    fields: HierarchyRef<'a>,
}

impl<'a> Hierarchy<'a> {
    /// `None` unless `def` declares a hierarchy.
    pub(crate) fn new(tx: &'a Tx<'a>, def: &'a EntityDef) -> Option<Self> {
        Some(Self {
            tx,
            entity: &def.name,
            fields: def.hierarchy()?,
        })
    }

    pub(crate) fn fields(&self) -> HierarchyRef<'a> {
        self.fields
    }

    /// Field values of an active node.
    pub(crate) fn node(&self, id: Id) -> TxResult<Option<Fields>> {
        match self.tx.live_row(self.entity, id)? {
            Some(row) => codec::decode_fields(&row.data).map(Some).or_abort(),
            None => Ok(None),
        }
    }

    pub(crate) fn parent_of(&self, node: &Fields) -> Option<Id> {
        node.get(self.fields.parent).and_then(Value::as_id)
    }

    pub(crate) fn depth_of(&self, node: &Fields) -> i64 {
        node.get(self.fields.depth)
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    fn is_enabled(&self, node: &Fields) -> bool {
        node.get(self.fields.enabled)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Depth of a node placed under `parent`; `None` if the parent is not
    /// active.
    pub(crate) fn depth_under(&self, parent: Option<Id>) -> TxResult<Option<i64>> {
        match parent {
            None => Ok(Some(0)),
            Some(parent) => Ok(self.node(parent)?.map(|node| self.depth_of(&node) + 1)),
        }
    }

    /// Active children of `id`, ascending.
    pub(crate) fn children(&self, id: Id) -> TxResult<Vec<(Id, Fields)>> {
        let mut children = Vec::new();
        for child in self.tx.children(self.entity, id)? {
            if let Some(node) = self.node(child)? {
                children.push((child, node));
            }
        }
        Ok(children)
    }

    /// Enabled leaves under `id`.
    ///
    /// A disabled or inactive node has none; an enabled node without enabled
    /// children is its own leaf.
    pub(crate) fn leaves(&self, id: Id) -> TxResult<BTreeSet<Id>> {
        let mut leaves = BTreeSet::new();
        let Some(root) = self.node(id)? else {
            return Ok(leaves);
        };
        if !self.is_enabled(&root) {
            return Ok(leaves);
        }

        let mut stack = vec![id];
        let mut seen = HashSet::new();
        while let Some(node) = stack.pop() {
            if !seen.insert(node) {
                continue;
            }
            let enabled: Vec<Id> = self
                .children(node)?
                .into_iter()
                .filter(|(_, child)| self.is_enabled(child))
                .map(|(child, _)| child)
                .collect();

            if enabled.is_empty() {
                leaves.insert(node);
            } else {
                stack.extend(enabled);
            }
        }
        Ok(leaves)
    }

    /// Active ancestors of `id`, nearest first.
    pub(crate) fn ancestors(&self, id: Id) -> TxResult<Vec<Id>> {
        let mut ancestors = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut cursor = self.node(id)?.and_then(|node| self.parent_of(&node));

        while let Some(parent) = cursor {
            if !seen.insert(parent) {
                break;
            }
            let Some(node) = self.node(parent)? else {
                break;
            };
            ancestors.push(parent);
            cursor = self.parent_of(&node);
        }
        Ok(ancestors)
    }

    /// Active descendants of `id` with the depth each should have, parents
    /// before children.
    pub(crate) fn expected_depths(&self, id: Id) -> TxResult<Vec<(Id, Fields, i64)>> {
        let mut out = Vec::new();
        let Some(root) = self.node(id)? else {
            return Ok(out);
        };

        let mut queue = VecDeque::from([(id, self.depth_of(&root))]);
        let mut seen = HashSet::from([id]);
        while let Some((node, depth)) = queue.pop_front() {
            for (child, fields) in self.children(node)? {
                if seen.insert(child) {
                    queue.push_back((child, depth + 1));
                    out.push((child, fields, depth + 1));
                }
            }
        }
        Ok(out)
    }

    /// The cache value describing `leaves`.
    pub(crate) fn cache_value(leaves: &BTreeSet<Id>) -> Value {
        Value::Json(leaves.iter().map(|id| id.get()).collect())
    }

    /// Whether the node's cached leaf set equals `leaves`.
    pub(crate) fn cache_matches(&self, node: &Fields, leaves: &BTreeSet<Id>) -> bool {
        node.get(self.fields.leaves) == Some(&Self::cache_value(leaves))
    }
}
