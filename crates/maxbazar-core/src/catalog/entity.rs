//! Entity definitions.

use rkyv::{Archive, Deserialize, Serialize};

use super::constraint::ConstraintDef;
use super::field::FieldDef;

/// An entity definition (table schema).
///
/// The envelope (`id`, `created_at`, `updated_at`, `deleted_at`) is implicit
/// and never declared as a field.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct EntityDef {
    /// Entity name (unique within schema).
    pub name: String,
    /// Field definitions in declaration order.
    pub fields: Vec<FieldDef>,
    /// Constraints on this entity.
    pub constraints: Vec<ConstraintDef>,
}

/// A resolved foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKeyRef<'a> {
    /// Foreign key field.
    pub field: &'a str,
    /// Referenced entity.
    pub references: &'a str,
    /// Whether the link must stay acyclic.
    pub acyclic: bool,
}

/// A resolved tree declaration: the parent link plus the derived fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyRef<'a> {
    /// Self-referencing parent field.
    pub parent: &'a str,
    /// Depth field.
    pub depth: &'a str,
    /// Enabled flag field.
    pub enabled: &'a str,
    /// Leaf cache field.
    pub leaves: &'a str,
}

/// A resolved uniqueness group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqueGroup<'a> {
    /// Group name.
    pub name: &'a str,
    /// Fields forming the key, in key order.
    pub fields: &'a [String],
    /// Whether null components disable the group for a row.
    pub nulls_distinct: bool,
}

impl EntityDef {
    /// Create a new entity definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Add a field to the entity.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add multiple fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Add a constraint.
    pub fn with_constraint(mut self, constraint: ConstraintDef) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Add a foreign key named `<entity>_<field>_fk`.
    pub fn references(self, field: &str, entity: &str) -> Self {
        let name = format!("{}_{}_fk", self.name.to_lowercase(), field);
        self.with_constraint(ConstraintDef::foreign_key(name, field, entity))
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Declared uniqueness groups.
    pub fn unique_groups(&self) -> impl Iterator<Item = UniqueGroup<'_>> {
        self.constraints.iter().filter_map(|c| match c {
            ConstraintDef::Unique {
                name,
                fields,
                nulls_distinct,
            } => Some(UniqueGroup {
                name,
                fields,
                nulls_distinct: *nulls_distinct,
            }),
            _ => None,
        })
    }

    /// Declared foreign keys.
    pub fn foreign_keys(&self) -> impl Iterator<Item = ForeignKeyRef<'_>> {
        self.constraints.iter().filter_map(|c| match c {
            ConstraintDef::ForeignKey {
                field,
                references,
                acyclic,
                ..
            } => Some(ForeignKeyRef {
                field,
                references,
                acyclic: *acyclic,
            }),
            _ => None,
        })
    }

    /// The acyclic self-reference, if this entity forms a tree.
    pub fn parent_link(&self) -> Option<ForeignKeyRef<'_>> {
        self.foreign_keys()
            .find(|fk| fk.acyclic && fk.references == self.name)
    }

    /// The maintained tree fields, if declared alongside a parent link.
    pub fn hierarchy(&self) -> Option<HierarchyRef<'_>> {
        let parent = self.parent_link()?.field;
        self.constraints.iter().find_map(|c| match c {
            ConstraintDef::Hierarchy {
                depth,
                enabled,
                leaves,
                ..
            } => Some(HierarchyRef {
                parent,
                depth,
                enabled,
                leaves,
            }),
            _ => None,
        })
    }

    /// Whether `field` is computed by the store rather than written by callers.
    pub fn is_derived(&self, field: &str) -> bool {
        self.hierarchy()
            .is_some_and(|h| h.depth == field || h.leaves == field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldType;

    fn category() -> EntityDef {
        EntityDef::new("ItemType")
            .with_field(FieldDef::new("name", FieldType::String))
            .with_field(FieldDef::optional("parent_item_type_id", FieldType::Id))
            .with_constraint(ConstraintDef::unique("unique_item_type_name", "name"))
            .with_constraint(ConstraintDef::tree_parent(
                "item_type_parent_fk",
                "parent_item_type_id",
                "ItemType",
            ))
    }

    #[test]
    fn test_entity_builder() {
        let entity = category();

        assert_eq!(entity.name, "ItemType");
        assert_eq!(entity.fields.len(), 2);
        assert_eq!(entity.unique_groups().count(), 1);
        assert_eq!(entity.foreign_keys().count(), 1);
    }

    #[test]
    fn test_get_field() {
        let entity = category();

        assert!(entity.get_field("name").is_some());
        assert!(entity.get_field("nonexistent").is_none());
    }

    #[test]
    fn test_parent_link() {
        let entity = category();
        let link = entity.parent_link().unwrap();
        assert_eq!(link.field, "parent_item_type_id");

        let item = EntityDef::new("Item")
            .with_field(FieldDef::new("item_type_id", FieldType::Id))
            .references("item_type_id", "ItemType");
        assert!(item.parent_link().is_none());
        assert_eq!(item.foreign_keys().next().unwrap().references, "ItemType");
    }

    #[test]
    fn test_hierarchy_needs_parent_link() {
        let tree = ConstraintDef::hierarchy("tree", "depth", "enabled", "leaves");

        let entity = category().with_constraint(tree.clone());
        let hierarchy = entity.hierarchy().unwrap();
        assert_eq!(hierarchy.parent, "parent_item_type_id");
        assert!(entity.is_derived("depth"));
        assert!(entity.is_derived("leaves"));
        assert!(!entity.is_derived("enabled"));

        let flat = EntityDef::new("Setting").with_constraint(tree);
        assert!(flat.hierarchy().is_none());
        assert!(!flat.is_derived("depth"));
    }
}
