//! Entity registry: declares entity shapes and validates candidate records.

use std::collections::{HashMap, HashSet};

use super::{ConstraintDef, EntityDef, FieldType, SchemaBundle};
use crate::error::{Error, FieldViolation, SchemaError};
use crate::value::{Fields, Value};

/// The closed set of entity types a store accepts.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: HashMap<String, EntityDef>,
    /// Definition order, used for deterministic listings.
    order: Vec<String>,
}

impl EntityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity's shape.
    ///
    /// Foreign keys may only target entities defined earlier or the entity
    /// itself.
    pub fn define(&mut self, entity: EntityDef) -> Result<(), SchemaError> {
        if self.entities.contains_key(&entity.name) {
            return Err(SchemaError::DuplicateEntity(entity.name));
        }

        self.check_fields(&entity)?;
        self.check_constraints(&entity)?;

        self.order.push(entity.name.clone());
        self.entities.insert(entity.name.clone(), entity);
        Ok(())
    }

    /// Builder-style [`define`](Self::define).
    pub fn with(mut self, entity: EntityDef) -> Result<Self, SchemaError> {
        self.define(entity)?;
        Ok(self)
    }

    /// Get an entity definition.
    pub fn get(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    /// Get an entity definition or fail with a schema error.
    pub fn require(&self, name: &str) -> Result<&EntityDef, Error> {
        self.get(name)
            .ok_or_else(|| SchemaError::UndefinedEntity(name.to_string()).into())
    }

    /// Entity names in definition order.
    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Number of defined entities.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if no entity is defined.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Freeze the registry into a schema bundle.
    pub fn to_bundle(&self, version: u64) -> SchemaBundle {
        let entities = self
            .entity_names()
            .filter_map(|name| self.entities.get(name))
            .cloned()
            .collect();
        SchemaBundle::new(version, entities)
    }

    /// Check a candidate record against required-field, type and presence
    /// constraints.
    ///
    /// Every violation is reported, not just the first.
    pub fn validate(&self, entity: &str, record: &Fields) -> Result<(), Error> {
        let def = self.require(entity)?;
        let violations = collect_violations(def, record);

        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation {
                entity: entity.to_string(),
                violations,
            })
        }
    }

    /// Fill unset fields: declared defaults first, then null for the rest.
    ///
    /// `now` is the insert time in microseconds.
    pub fn apply_defaults(&self, entity: &str, record: &mut Fields, now: i64) -> Result<(), Error> {
        let def = self.require(entity)?;
        for field in &def.fields {
            let unset = record.get(&field.name).map_or(true, Value::is_null);
            if !unset {
                continue;
            }
            let value = field
                .default
                .as_ref()
                .map_or(Value::Null, |d| d.resolve(now));
            record.insert(field.name.clone(), value);
        }
        Ok(())
    }

    /// Widen integers held by float fields, so stored rows and group keys
    /// see one representation.
    pub fn coerce(&self, entity: &str, record: &mut Fields) -> Result<(), Error> {
        let def = self.require(entity)?;
        for field in def.fields.iter().filter(|f| f.field_type == FieldType::Float) {
            if let Some(value) = record.get_mut(&field.name) {
                if let Value::Int(i) = *value {
                    *value = Value::Float(i as f64);
                }
            }
        }
        Ok(())
    }

    fn check_fields(&self, entity: &EntityDef) -> Result<(), SchemaError> {
        let mut seen: HashMap<&str, &super::FieldDef> = HashMap::new();

        for field in &entity.fields {
            if let Some(previous) = seen.get(field.name.as_str()) {
                if previous.default != field.default {
                    return Err(SchemaError::ConflictingDefaults {
                        entity: entity.name.clone(),
                        field: field.name.clone(),
                    });
                }
                return Err(SchemaError::DuplicateField {
                    entity: entity.name.clone(),
                    field: field.name.clone(),
                });
            }

            if let Some(default) = &field.default {
                default
                    .check_fits(field.field_type, field.required)
                    .map_err(|reason| SchemaError::IncompatibleDefault {
                        entity: entity.name.clone(),
                        field: field.name.clone(),
                        reason,
                    })?;
            }

            seen.insert(&field.name, field);
        }

        Ok(())
    }

    fn check_constraints(&self, entity: &EntityDef) -> Result<(), SchemaError> {
        let mut names = HashSet::new();

        for constraint in &entity.constraints {
            let invalid = |reason: &str| SchemaError::InvalidConstraint {
                entity: entity.name.clone(),
                constraint: constraint.name().to_string(),
                reason: reason.to_string(),
            };

            if !names.insert(constraint.name()) {
                return Err(invalid("constraint name is declared more than once"));
            }

            let fields = constraint.fields();
            if fields.is_empty() {
                return Err(invalid("constraint names no fields"));
            }

            for name in &fields {
                if entity.get_field(name).is_none() {
                    return Err(SchemaError::UnknownField {
                        entity: entity.name.clone(),
                        constraint: constraint.name().to_string(),
                        field: (*name).to_string(),
                    });
                }
            }

            match constraint {
                ConstraintDef::Unique { .. } => {}
                ConstraintDef::ForeignKey {
                    field,
                    references,
                    acyclic,
                    ..
                } => {
                    let is_self = *references == entity.name;
                    if !is_self && !self.entities.contains_key(references) {
                        return Err(SchemaError::UnknownEntity {
                            entity: entity.name.clone(),
                            field: field.clone(),
                            target: references.clone(),
                        });
                    }
                    if entity
                        .get_field(field)
                        .is_some_and(|f| f.field_type != FieldType::Id)
                    {
                        return Err(invalid("foreign key field must have type Id"));
                    }
                    if *acyclic && !is_self {
                        return Err(invalid("acyclic links must reference the entity itself"));
                    }
                }
                ConstraintDef::Hierarchy {
                    depth,
                    enabled,
                    leaves,
                    ..
                } => {
                    if entity.parent_link().is_none() {
                        return Err(invalid("hierarchy needs a tree parent link"));
                    }
                    let expected = [
                        (depth, FieldType::Int),
                        (enabled, FieldType::Bool),
                        (leaves, FieldType::Json),
                    ];
                    for (field, field_type) in expected {
                        if entity
                            .get_field(field)
                            .is_some_and(|f| f.field_type != field_type)
                        {
                            return Err(invalid(&format!(
                                "hierarchy field {field} must have type {}",
                                field_type.name()
                            )));
                        }
                    }
                    if entity.get_field(leaves).is_some_and(|f| f.required) {
                        return Err(invalid("leaf cache field must be optional"));
                    }
                    if entity
                        .unique_groups()
                        .any(|g| g.fields.iter().any(|f| f == leaves))
                    {
                        return Err(invalid("leaf cache field cannot be part of a unique group"));
                    }
                }
                ConstraintDef::OneOf { .. } => {
                    if fields.len() < 2 {
                        return Err(invalid("presence rule needs at least two fields"));
                    }
                    if fields
                        .iter()
                        .filter_map(|name| entity.get_field(name))
                        .any(|f| f.required)
                    {
                        return Err(invalid("presence rule fields must be optional"));
                    }
                }
            }
        }

        Ok(())
    }
}

fn collect_violations(def: &EntityDef, record: &Fields) -> Vec<FieldViolation> {
    let mut violations = Vec::new();

    for field in &def.fields {
        match record.get(&field.name) {
            None | Some(Value::Null) => {
                if field.required {
                    violations.push(FieldViolation::new(&field.name, "required field is missing"));
                }
            }
            Some(value) if !field.field_type.accepts(value) => {
                violations.push(FieldViolation::new(
                    &field.name,
                    format!(
                        "expected {}, got {}",
                        field.field_type.name(),
                        value.type_name()
                    ),
                ));
            }
            Some(_) => {}
        }
    }

    for name in record.keys() {
        if def.get_field(name).is_none() {
            violations.push(FieldViolation::new(name, "unknown field"));
        }
    }

    for constraint in &def.constraints {
        if let ConstraintDef::OneOf {
            fields, exclusive, ..
        } = constraint
        {
            let set = fields
                .iter()
                .filter(|f| record.get(*f).is_some_and(|v| !v.is_null()))
                .count();
            let ok = if *exclusive { set == 1 } else { set >= 1 };
            if !ok {
                let expectation = if *exclusive { "exactly one" } else { "at least one" };
                violations.push(FieldViolation::new(
                    fields.join("|"),
                    format!("{expectation} of these fields must be set, found {set}"),
                ));
            }
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DefaultValue, FieldDef};
    use crate::value::Id;

    fn user() -> EntityDef {
        EntityDef::new("User")
            .with_field(FieldDef::new("first_name", FieldType::String))
            .with_field(FieldDef::new("email", FieldType::String))
            .with_field(
                FieldDef::new("average_rating", FieldType::Float)
                    .with_default(DefaultValue::Float(0.0)),
            )
            .with_field(FieldDef::optional("note", FieldType::String))
            .with_constraint(ConstraintDef::unique_composite(
                "unique_user",
                ["first_name", "email"],
            ))
    }

    fn registry() -> EntityRegistry {
        let mut registry = EntityRegistry::new();
        registry.define(user()).unwrap();
        registry
    }

    #[test]
    fn test_define_rejects_unknown_group_field() {
        let mut registry = EntityRegistry::new();
        let entity = user().with_constraint(ConstraintDef::unique("unique_phone", "phone"));

        let err = registry.define(entity).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownField { field, .. } if field == "phone"));
    }

    #[test]
    fn test_define_rejects_conflicting_defaults() {
        let mut registry = EntityRegistry::new();
        let entity = EntityDef::new("Setting")
            .with_field(
                FieldDef::new("enabled", FieldType::Bool).with_default(DefaultValue::Bool(true)),
            )
            .with_field(
                FieldDef::new("enabled", FieldType::Bool).with_default(DefaultValue::Bool(false)),
            );

        assert!(matches!(
            registry.define(entity),
            Err(SchemaError::ConflictingDefaults { .. })
        ));
    }

    #[test]
    fn test_define_rejects_mistyped_default() {
        let mut registry = EntityRegistry::new();
        let entity = EntityDef::new("Setting").with_field(
            FieldDef::new("enabled", FieldType::Bool)
                .with_default(DefaultValue::String("yes".into())),
        );

        assert!(matches!(
            registry.define(entity),
            Err(SchemaError::IncompatibleDefault { .. })
        ));
    }

    #[test]
    fn test_define_rejects_unknown_reference_target() {
        let mut registry = EntityRegistry::new();
        let item = EntityDef::new("Item")
            .with_field(FieldDef::new("user_id", FieldType::Id))
            .references("user_id", "User");

        assert!(matches!(
            registry.define(item.clone()),
            Err(SchemaError::UnknownEntity { .. })
        ));

        registry.define(user()).unwrap();
        registry.define(item).unwrap();
        assert_eq!(registry.entity_names().collect::<Vec<_>>(), vec!["User", "Item"]);
    }

    #[test]
    fn test_define_checks_hierarchy() {
        let category = || {
            EntityDef::new("Category")
                .with_field(FieldDef::optional("parent_id", FieldType::Id))
                .with_field(
                    FieldDef::new("depth", FieldType::Int).with_default(DefaultValue::Int(0)),
                )
                .with_field(FieldDef::new("enabled", FieldType::Bool))
                .with_field(FieldDef::optional("leaves", FieldType::Json))
        };
        let tree = || ConstraintDef::hierarchy("category_tree", "depth", "enabled", "leaves");
        let parent = || ConstraintDef::tree_parent("category_parent_fk", "parent_id", "Category");

        let unlinked = category().with_constraint(tree());
        assert!(matches!(
            EntityRegistry::new().define(unlinked),
            Err(SchemaError::InvalidConstraint { reason, .. }) if reason.contains("tree parent")
        ));

        let indexed_cache = category()
            .with_constraint(parent())
            .with_constraint(tree())
            .with_constraint(ConstraintDef::unique("unique_leaves", "leaves"));
        assert!(matches!(
            EntityRegistry::new().define(indexed_cache),
            Err(SchemaError::InvalidConstraint { .. })
        ));

        let valid = category().with_constraint(parent()).with_constraint(tree());
        EntityRegistry::new().define(valid).unwrap();
    }

    #[test]
    fn test_define_rejects_duplicate_entity() {
        let mut registry = registry();
        assert_eq!(
            registry.define(user()),
            Err(SchemaError::DuplicateEntity("User".into()))
        );
    }

    #[test]
    fn test_validate_reports_every_violation() {
        let registry = registry();
        let mut record = Fields::new();
        record.insert("first_name".into(), Value::Int(1));
        record.insert("nickname".into(), Value::String("x".into()));

        match registry.validate("User", &record) {
            Err(Error::Validation { violations, .. }) => {
                let fields: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
                assert_eq!(fields, vec!["first_name", "email", "average_rating", "nickname"]);
            }
            other => panic!("Expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_presence_rule() {
        let mut registry = registry();
        registry
            .define(
                EntityDef::new("Watch")
                    .with_field(FieldDef::optional("item_id", FieldType::Id))
                    .with_field(FieldDef::optional("data", FieldType::Json))
                    .with_constraint(ConstraintDef::exactly_one(
                        "watch_target",
                        ["item_id", "data"],
                    )),
            )
            .unwrap();

        let mut record = Fields::new();
        assert!(registry.validate("Watch", &record).is_err());

        record.insert("item_id".into(), Value::Id(Id(1)));
        assert!(registry.validate("Watch", &record).is_ok());

        record.insert("data".into(), Value::Json(serde_json::json!({})));
        assert!(registry.validate("Watch", &record).is_err());
    }

    #[test]
    fn test_apply_defaults() {
        let registry = registry();
        let mut record = Fields::new();
        record.insert("first_name".into(), "A".into());
        registry.apply_defaults("User", &mut record, 7).unwrap();

        assert_eq!(record.get("average_rating"), Some(&Value::Float(0.0)));
        assert_eq!(record.get("note"), Some(&Value::Null));
        assert_eq!(record.get("email"), Some(&Value::Null));
    }

    #[test]
    fn test_validate_unknown_entity() {
        let registry = registry();
        assert!(matches!(
            registry.validate("Ghost", &Fields::new()),
            Err(Error::Schema(SchemaError::UndefinedEntity(_)))
        ));
    }
}
