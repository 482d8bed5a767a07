//! Constraint definitions for entities.

use rkyv::{Archive, Deserialize, Serialize};

/// A constraint definition attached to one entity.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum ConstraintDef {
    /// Uniqueness group (single or composite) over live rows.
    Unique {
        /// Group name.
        name: String,
        /// Fields that must be unique together.
        fields: Vec<String>,
        /// When true, a key containing a null is not enforced.
        nulls_distinct: bool,
    },
    /// Foreign key constraint.
    ForeignKey {
        /// Constraint name.
        name: String,
        /// Foreign key field.
        field: String,
        /// Referenced entity.
        references: String,
        /// Reject writes that would make the parent chain loop.
        /// Only meaningful for self-references.
        acyclic: bool,
    },
    /// Presence rule over a set of nullable fields.
    OneOf {
        /// Constraint name.
        name: String,
        /// Candidate fields.
        fields: Vec<String>,
        /// Exactly one must be set when true, at least one otherwise.
        exclusive: bool,
    },
    /// Fields the store derives from the entity's parent link.
    Hierarchy {
        /// Constraint name.
        name: String,
        /// Distance from the root, kept in step with the parent link.
        depth: String,
        /// Disabled nodes are pruned from leaf sets.
        enabled: String,
        /// Cached sorted ids of the enabled leaves below the node.
        leaves: String,
    },
}

impl ConstraintDef {
    /// Create a uniqueness group over a single field.
    pub fn unique(name: impl Into<String>, field: impl Into<String>) -> Self {
        ConstraintDef::Unique {
            name: name.into(),
            fields: vec![field.into()],
            nulls_distinct: true,
        }
    }

    /// Create a composite uniqueness group.
    pub fn unique_composite(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        ConstraintDef::Unique {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            nulls_distinct: true,
        }
    }

    /// Treat null as an ordinary key component (unique groups only).
    pub fn nulls_not_distinct(mut self) -> Self {
        if let ConstraintDef::Unique { nulls_distinct, .. } = &mut self {
            *nulls_distinct = false;
        }
        self
    }

    /// Create a foreign key constraint.
    pub fn foreign_key(
        name: impl Into<String>,
        field: impl Into<String>,
        references: impl Into<String>,
    ) -> Self {
        ConstraintDef::ForeignKey {
            name: name.into(),
            field: field.into(),
            references: references.into(),
            acyclic: false,
        }
    }

    /// Create a self-referential parent link that must stay acyclic.
    pub fn tree_parent(
        name: impl Into<String>,
        field: impl Into<String>,
        entity: impl Into<String>,
    ) -> Self {
        ConstraintDef::ForeignKey {
            name: name.into(),
            field: field.into(),
            references: entity.into(),
            acyclic: true,
        }
    }

    /// Require exactly one of the fields to be set.
    pub fn exactly_one(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        ConstraintDef::OneOf {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            exclusive: true,
        }
    }

    /// Require at least one of the fields to be set.
    pub fn at_least_one(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        ConstraintDef::OneOf {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            exclusive: false,
        }
    }

    /// Have the store maintain depth and leaf cache fields for a tree.
    ///
    /// Requires a [`tree_parent`](Self::tree_parent) link on the same entity.
    pub fn hierarchy(
        name: impl Into<String>,
        depth: impl Into<String>,
        enabled: impl Into<String>,
        leaves: impl Into<String>,
    ) -> Self {
        ConstraintDef::Hierarchy {
            name: name.into(),
            depth: depth.into(),
            enabled: enabled.into(),
            leaves: leaves.into(),
        }
    }

    /// Get the constraint name.
    pub fn name(&self) -> &str {
        match self {
            ConstraintDef::Unique { name, .. } => name,
            ConstraintDef::ForeignKey { name, .. } => name,
            ConstraintDef::OneOf { name, .. } => name,
            ConstraintDef::Hierarchy { name, .. } => name,
        }
    }

    /// Fields the constraint reads.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            ConstraintDef::Unique { fields, .. } | ConstraintDef::OneOf { fields, .. } => {
                fields.iter().map(String::as_str).collect()
            }
            ConstraintDef::ForeignKey { field, .. } => vec![field.as_str()],
            ConstraintDef::Hierarchy {
                depth,
                enabled,
                leaves,
                ..
            } => vec![depth.as_str(), enabled.as_str(), leaves.as_str()],
        }
    }
}
