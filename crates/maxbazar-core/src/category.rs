//! Hierarchical item categories.
//!
//! Item types form a forest through `parent_item_type_id`. Listings filed
//! under a category are searched across its enabled leaves, which each node
//! caches in `final_item_type_ids`. The store keeps depths and caches current
//! on every write; this module adds the tree-shaped operations on top.

use std::collections::BTreeSet;

use tracing::{debug, instrument};

use crate::catalog::EntityDef;
use crate::error::Error;
use crate::lifecycle::{Entity, Filter, Hierarchy, Pagination, Repository, Store};
use crate::model::ItemType;
use crate::storage::{abort, Tx, TxResult};
use crate::value::{Fields, Id, Value};

const PARENT: &str = "parent_item_type_id";
const ENABLED: &str = "enabled";

/// Category operations over the `ItemType` entity.
pub struct CategoryTree<'a> {
    store: &'a Store,
    def: &'a EntityDef,
    repo: Repository<'a, ItemType>,
}

impl<'a> CategoryTree<'a> {
    /// Create a category view over a store whose registry defines `ItemType`.
    pub fn new(store: &'a Store) -> Result<Self, Error> {
        Ok(Self {
            store,
            def: store.registry().require(ItemType::NAME)?,
            repo: store.repository()?,
        })
    }

    /// Insert a category. Its depth and leaf cache are derived by the store.
    #[instrument(skip(self, item_type), fields(name = %item_type.name))]
    pub fn insert(&self, item_type: &ItemType) -> Result<Id, Error> {
        self.repo.create(item_type)
    }

    /// Enabled leaf categories under `id`.
    ///
    /// An enabled leaf resolves to itself; a disabled node resolves to the
    /// empty set, as does any subtree below it.
    #[instrument(skip(self))]
    pub fn resolve_descendant_leaves(&self, id: Id) -> Result<BTreeSet<Id>, Error> {
        self.store.transaction(|tx| {
            let tree = self.hierarchy(tx)?;
            if tree.node(id)?.is_none() {
                return abort(Error::not_found(ItemType::NAME, id));
            }
            tree.leaves(id)
        })
    }

    /// Move `child` under `parent`, or make it a root when `parent` is `None`.
    ///
    /// The move, the depth changes of the whole subtree and the leaf caches
    /// of both ancestries commit together.
    #[instrument(skip(self))]
    pub fn attach(&self, child: Id, parent: Option<Id>) -> Result<(), Error> {
        if parent == Some(child) {
            return Err(Error::Cycle {
                entity: ItemType::NAME.to_string(),
                child,
                parent: child,
            });
        }

        let mut patch = Fields::new();
        patch.insert(PARENT.to_string(), parent.into());
        self.store.update(ItemType::NAME, child, patch)?;

        debug!(%child, "category attached");
        Ok(())
    }

    /// Enable or disable a category.
    #[instrument(skip(self))]
    pub fn set_enabled(&self, id: Id, enabled: bool) -> Result<(), Error> {
        let mut patch = Fields::new();
        patch.insert(ENABLED.to_string(), Value::Bool(enabled));
        self.repo.patch(id, patch)?;
        Ok(())
    }

    /// Rebuild child lists, depths and leaf caches of every active category,
    /// writing only rows that changed. Returns how many were written.
    ///
    /// Only needed for stores written before the caches were maintained.
    #[instrument(skip(self))]
    pub fn refresh(&self) -> Result<usize, Error> {
        let ids: Vec<Id> = self
            .store
            .list(ItemType::NAME, &Filter::new(), Pagination::all())?
            .items
            .iter()
            .map(|row| row.id)
            .collect();

        let written = self.store.transaction(|tx| {
            let tree = self.hierarchy(tx)?;
            self.store.rebuild_hierarchy(tx, self.def, &tree, &ids)
        })?;

        debug!(written, "category tree rebuilt");
        Ok(written)
    }

    fn hierarchy<'t>(&'t self, tx: &'t Tx<'t>) -> TxResult<Hierarchy<'t>> {
        match Hierarchy::new(tx, self.def) {
            Some(tree) => Ok(tree),
            None => abort(Error::InvalidData(format!(
                "{} declares no hierarchy",
                ItemType::NAME
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::marketplace_registry;

    fn store() -> Store {
        Store::temporary(marketplace_registry().unwrap()).unwrap()
    }

    fn node(name: &str, parent: Option<Id>) -> ItemType {
        let mut item_type = ItemType::new(name, format!("/{name}"));
        item_type.parent_item_type_id = parent;
        item_type
    }

    fn cached(tree: &CategoryTree<'_>, id: Id) -> Option<serde_json::Value> {
        tree.repo.get(id).unwrap().data.final_item_type_ids
    }

    fn depth(tree: &CategoryTree<'_>, id: Id) -> i64 {
        tree.repo.get(id).unwrap().data.category_depth
    }

    #[test]
    fn test_leaves_and_cache() {
        let store = store();
        let tree = CategoryTree::new(&store).unwrap();

        let cars = tree.insert(&node("cars", None)).unwrap();
        let skoda = tree.insert(&node("skoda", Some(cars))).unwrap();
        let bmw = tree.insert(&node("bmw", Some(cars))).unwrap();

        let leaves = tree.resolve_descendant_leaves(cars).unwrap();
        assert_eq!(leaves, BTreeSet::from([skoda, bmw]));
        assert_eq!(
            tree.resolve_descendant_leaves(skoda).unwrap(),
            BTreeSet::from([skoda])
        );

        assert_eq!(cached(&tree, cars), Some(serde_json::json!([skoda.get(), bmw.get()])));
        assert_eq!(cached(&tree, bmw), Some(serde_json::json!([bmw.get()])));
        assert_eq!(depth(&tree, bmw), 1);
    }

    #[test]
    fn test_unknown_node_is_not_found() {
        let store = store();
        let tree = CategoryTree::new(&store).unwrap();
        assert!(matches!(
            tree.resolve_descendant_leaves(Id(9)),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_disabled_nodes() {
        let store = store();
        let tree = CategoryTree::new(&store).unwrap();

        let root = tree.insert(&node("root", None)).unwrap();
        let a = tree.insert(&node("a", Some(root))).unwrap();

        tree.set_enabled(a, false).unwrap();
        assert_eq!(tree.resolve_descendant_leaves(root).unwrap(), BTreeSet::from([root]));
        assert!(tree.resolve_descendant_leaves(a).unwrap().is_empty());
        assert_eq!(cached(&tree, root), Some(serde_json::json!([root.get()])));
        assert_eq!(cached(&tree, a), Some(serde_json::json!([])));

        tree.set_enabled(a, true).unwrap();
        assert_eq!(cached(&tree, root), Some(serde_json::json!([a.get()])));
    }

    #[test]
    fn test_attach_updates_subtree_depth() {
        let store = store();
        let tree = CategoryTree::new(&store).unwrap();

        let a = tree.insert(&node("a", None)).unwrap();
        let b = tree.insert(&node("b", None)).unwrap();
        let c = tree.insert(&node("c", Some(b))).unwrap();

        tree.attach(b, Some(a)).unwrap();
        assert_eq!(depth(&tree, b), 1);
        assert_eq!(depth(&tree, c), 2);
        assert_eq!(tree.resolve_descendant_leaves(a).unwrap(), BTreeSet::from([c]));
        assert_eq!(cached(&tree, a), Some(serde_json::json!([c.get()])));

        tree.attach(b, None).unwrap();
        assert_eq!(depth(&tree, b), 0);
        assert_eq!(depth(&tree, c), 1);
        assert_eq!(cached(&tree, a), Some(serde_json::json!([a.get()])));
    }

    #[test]
    fn test_attach_rejects_cycles() {
        let store = store();
        let tree = CategoryTree::new(&store).unwrap();

        let a = tree.insert(&node("a", None)).unwrap();
        let b = tree.insert(&node("b", Some(a))).unwrap();

        assert!(matches!(tree.attach(a, Some(a)), Err(Error::Cycle { .. })));
        assert!(matches!(tree.attach(a, Some(b)), Err(Error::Cycle { .. })));
        assert_eq!(tree.repo.get(a).unwrap().data.parent_item_type_id, None);
        assert_eq!(depth(&tree, a), 0);
        assert_eq!(depth(&tree, b), 1);
    }

    #[test]
    fn test_attach_under_missing_parent_changes_nothing() {
        let store = store();
        let tree = CategoryTree::new(&store).unwrap();

        let a = tree.insert(&node("a", None)).unwrap();
        assert!(matches!(
            tree.attach(a, Some(Id(40))),
            Err(Error::DanglingReference { .. })
        ));
        assert_eq!(depth(&tree, a), 0);
        assert_eq!(cached(&tree, a), Some(serde_json::json!([a.get()])));
    }

    #[test]
    fn test_soft_delete_through_repository_updates_parent_cache() {
        let store = store();
        let tree = CategoryTree::new(&store).unwrap();

        let root = tree.insert(&node("root", None)).unwrap();
        let a = tree.insert(&node("a", Some(root))).unwrap();
        let b = tree.insert(&node("b", Some(root))).unwrap();

        tree.repo.soft_delete(a).unwrap();
        assert_eq!(cached(&tree, root), Some(serde_json::json!([b.get()])));
        assert_eq!(tree.resolve_descendant_leaves(root).unwrap(), BTreeSet::from([b]));

        tree.repo.soft_delete(b).unwrap();
        assert_eq!(cached(&tree, root), Some(serde_json::json!([root.get()])));
    }

    #[test]
    fn test_store_update_moves_node() {
        let store = store();
        let tree = CategoryTree::new(&store).unwrap();

        let r1 = tree.insert(&node("r1", None)).unwrap();
        let r2 = tree.insert(&node("r2", None)).unwrap();
        let leaf = tree.insert(&node("leaf", Some(r2))).unwrap();

        let mut patch = Fields::new();
        patch.insert(PARENT.to_string(), Value::Id(r1));
        let row = store.update(ItemType::NAME, r2, patch).unwrap();

        assert_eq!(row.fields.get("category_depth"), Some(&Value::Int(1)));
        assert_eq!(depth(&tree, leaf), 2);
        assert_eq!(cached(&tree, r1), Some(serde_json::json!([leaf.get()])));
    }

    #[test]
    fn test_derived_fields_in_input_are_ignored() {
        let store = store();
        let tree = CategoryTree::new(&store).unwrap();

        let mut forged = node("root", None);
        forged.category_depth = 7;
        forged.final_item_type_ids = Some(serde_json::json!([99]));
        let root = tree.repo.create(&forged).unwrap();
        assert_eq!(depth(&tree, root), 0);
        assert_eq!(cached(&tree, root), Some(serde_json::json!([root.get()])));

        let mut patch = Fields::new();
        patch.insert("category_depth".into(), Value::Int(3));
        tree.repo.patch(root, patch).unwrap();
        assert_eq!(depth(&tree, root), 0);
    }

    #[test]
    fn test_refresh_has_nothing_to_repair() {
        let store = store();
        let tree = CategoryTree::new(&store).unwrap();

        let root = tree.insert(&node("root", None)).unwrap();
        tree.insert(&node("a", Some(root))).unwrap();
        tree.set_enabled(root, false).unwrap();

        assert_eq!(tree.refresh().unwrap(), 0);
    }
}
