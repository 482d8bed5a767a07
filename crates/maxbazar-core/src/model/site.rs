//! Site-wide records: settings, address lookup, traffic and roadmap.

use serde::{Deserialize, Serialize};

use crate::catalog::{ConstraintDef, DefaultValue, EntityDef, FieldDef, FieldType};
use crate::lifecycle::Entity;

/// A named configuration switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub name: String,
    pub value: Option<String>,
    pub enabled: bool,
    pub note: Option<String>,
}

impl Entity for Setting {
    const NAME: &'static str = "Setting";

    fn definition() -> EntityDef {
        EntityDef::new(Self::NAME)
            .with_fields([
                FieldDef::new("name", FieldType::String),
                FieldDef::optional("value", FieldType::String),
                FieldDef::new("enabled", FieldType::Bool).with_default(DefaultValue::Bool(true)),
                FieldDef::optional("note", FieldType::String),
            ])
            .with_constraint(ConstraintDef::unique("unique_settings", "name"))
    }
}

/// Postal code to place lookup entry from the RÚIAN address register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ruian {
    pub postal_code: String,
    pub location: String,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub note: Option<String>,
}

impl Entity for Ruian {
    const NAME: &'static str = "Ruian";

    fn definition() -> EntityDef {
        EntityDef::new(Self::NAME)
            .with_fields([
                FieldDef::new("postal_code", FieldType::String),
                FieldDef::new("location", FieldType::String),
                FieldDef::optional("longitude", FieldType::Float),
                FieldDef::optional("latitude", FieldType::Float),
                FieldDef::optional("note", FieldType::String),
            ])
            .with_constraint(ConstraintDef::unique_composite(
                "unique_ruian",
                ["postal_code", "location"],
            ))
    }
}

/// Daily site visit counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaxbazarVisitRecords {
    /// Calendar day, `YYYY-MM-DD`.
    pub date_time: String,
    pub count: i64,
}

impl Entity for MaxbazarVisitRecords {
    const NAME: &'static str = "MaxbazarVisitRecords";

    fn definition() -> EntityDef {
        EntityDef::new(Self::NAME)
            .with_fields([
                FieldDef::new("date_time", FieldType::String),
                FieldDef::new("count", FieldType::Int).with_default(DefaultValue::Int(0)),
            ])
            .with_constraint(ConstraintDef::unique(
                "unique_maxbazar_visit_records",
                "date_time",
            ))
    }
}

/// A proposed feature users can vote for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadmapRecords {
    pub heading: String,
    pub text: Option<String>,
    pub kind: Option<String>,
    pub count: i64,
    /// Ids of users who voted.
    pub user_ids: Option<serde_json::Value>,
    pub note: Option<String>,
}

impl Entity for RoadmapRecords {
    const NAME: &'static str = "RoadmapRecords";

    fn definition() -> EntityDef {
        EntityDef::new(Self::NAME)
            .with_fields([
                FieldDef::new("heading", FieldType::String),
                FieldDef::optional("text", FieldType::String),
                FieldDef::optional("kind", FieldType::String),
                FieldDef::new("count", FieldType::Int).with_default(DefaultValue::Int(0)),
                FieldDef::optional("user_ids", FieldType::Json),
                FieldDef::optional("note", FieldType::String),
            ])
            .with_constraint(ConstraintDef::unique("unique_roadmap_records", "heading"))
    }
}
