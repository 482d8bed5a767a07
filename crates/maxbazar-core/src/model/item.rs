//! Listings, their categories and per-listing records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::User;
use crate::catalog::{ConstraintDef, DefaultValue, EntityDef, FieldDef, FieldType};
use crate::lifecycle::Entity;
use crate::value::Id;

/// A listing category. Categories form a forest; see
/// [`CategoryTree`](crate::category::CategoryTree).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemType {
    pub name: String,
    /// None for a root category.
    pub parent_item_type_id: Option<Id>,
    /// Derived from the parent on every write; input values are ignored.
    pub category_depth: i64,
    pub data: Option<serde_json::Value>,
    pub url: String,
    pub count: i64,
    pub enabled: bool,
    /// Cached ids of the enabled leaves below this category, kept current by
    /// the store. Input values are ignored.
    pub final_item_type_ids: Option<serde_json::Value>,
    pub note: Option<String>,
}

impl ItemType {
    /// An enabled root category.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_item_type_id: None,
            category_depth: 0,
            data: None,
            url: url.into(),
            count: 0,
            enabled: true,
            final_item_type_ids: None,
            note: None,
        }
    }
}

impl Entity for ItemType {
    const NAME: &'static str = "ItemType";

    fn definition() -> EntityDef {
        EntityDef::new(Self::NAME)
            .with_fields([
                FieldDef::new("name", FieldType::String),
                FieldDef::optional("parent_item_type_id", FieldType::Id),
                FieldDef::new("category_depth", FieldType::Int).with_default(DefaultValue::Int(0)),
                FieldDef::optional("data", FieldType::Json),
                FieldDef::new("url", FieldType::String),
                FieldDef::new("count", FieldType::Int).with_default(DefaultValue::Int(0)),
                FieldDef::new("enabled", FieldType::Bool).with_default(DefaultValue::Bool(true)),
                FieldDef::optional("final_item_type_ids", FieldType::Json),
                FieldDef::optional("note", FieldType::String),
            ])
            .with_constraint(ConstraintDef::tree_parent(
                "itemtype_parent_item_type_id_fk",
                "parent_item_type_id",
                Self::NAME,
            ))
            .with_constraint(
                ConstraintDef::unique_composite(
                    "unique_item_type",
                    ["name", "parent_item_type_id", "category_depth", "url"],
                )
                .nulls_not_distinct(),
            )
            .with_constraint(ConstraintDef::unique("unique_item_type_url", "url"))
            .with_constraint(ConstraintDef::hierarchy(
                "item_type_tree",
                "category_depth",
                "enabled",
                "final_item_type_ids",
            ))
    }
}

/// A listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub heading: String,
    pub description: Option<String>,
    pub user_id: Id,
    pub item_type_id: Id,
    /// Contact details for anonymous listings.
    pub temporary_email: Option<String>,
    pub temporary_phone: Option<String>,
    pub temporary_password: Option<String>,
    pub item_data: Option<serde_json::Value>,
    pub price: f64,
    pub currency: Option<String>,
    #[serde(default)]
    pub date_time: Option<DateTime<Utc>>,
    pub delete_after: Option<DateTime<Utc>>,
    /// Automatic price drop schedule.
    pub decrease_price_after: Option<DateTime<Utc>>,
    pub decrease_price_amount: Option<f64>,
    pub location: Option<String>,
    pub public: bool,
    pub premium: bool,
    pub premium_date_time: Option<DateTime<Utc>>,
    pub premium_limit: bool,
    pub premium_limit_count: i64,
    pub vin: Option<String>,
    pub note: Option<String>,
}

impl Item {
    /// A private, non-premium listing with only the required fields set.
    pub fn new(heading: impl Into<String>, user_id: Id, item_type_id: Id) -> Self {
        Self {
            heading: heading.into(),
            description: None,
            user_id,
            item_type_id,
            temporary_email: None,
            temporary_phone: None,
            temporary_password: None,
            item_data: None,
            price: 0.0,
            currency: None,
            date_time: None,
            delete_after: None,
            decrease_price_after: None,
            decrease_price_amount: None,
            location: None,
            public: false,
            premium: false,
            premium_date_time: None,
            premium_limit: false,
            premium_limit_count: 0,
            vin: None,
            note: None,
        }
    }
}

impl Entity for Item {
    const NAME: &'static str = "Item";

    fn definition() -> EntityDef {
        EntityDef::new(Self::NAME)
            .with_fields([
                FieldDef::new("heading", FieldType::String),
                FieldDef::optional("description", FieldType::String),
                FieldDef::new("user_id", FieldType::Id),
                FieldDef::new("item_type_id", FieldType::Id),
                FieldDef::optional("temporary_email", FieldType::String),
                FieldDef::optional("temporary_phone", FieldType::String),
                FieldDef::optional("temporary_password", FieldType::String),
                FieldDef::optional("item_data", FieldType::Json),
                FieldDef::new("price", FieldType::Float).with_default(DefaultValue::Float(0.0)),
                FieldDef::optional("currency", FieldType::String),
                FieldDef::new("date_time", FieldType::Timestamp)
                    .with_default(DefaultValue::CurrentTimestamp),
                FieldDef::optional("delete_after", FieldType::Timestamp),
                FieldDef::optional("decrease_price_after", FieldType::Timestamp),
                FieldDef::optional("decrease_price_amount", FieldType::Float),
                FieldDef::optional("location", FieldType::String),
                FieldDef::new("public", FieldType::Bool).with_default(DefaultValue::Bool(false)),
                FieldDef::new("premium", FieldType::Bool).with_default(DefaultValue::Bool(false)),
                FieldDef::optional("premium_date_time", FieldType::Timestamp),
                FieldDef::new("premium_limit", FieldType::Bool)
                    .with_default(DefaultValue::Bool(false)),
                FieldDef::new("premium_limit_count", FieldType::Int)
                    .with_default(DefaultValue::Int(0)),
                FieldDef::optional("vin", FieldType::String),
                FieldDef::optional("note", FieldType::String),
            ])
            .references("user_id", User::NAME)
            .references("item_type_id", ItemType::NAME)
            .with_constraint(ConstraintDef::unique_composite(
                "unique_item",
                ["heading", "user_id"],
            ))
    }
}

/// A payment for premium placement, owned by an item, a user, or both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub payer_email: Option<String>,
    pub payer_name: Option<String>,
    pub premium_count: i64,
    pub item_id: Option<Id>,
    pub user_id: Option<Id>,
    #[serde(default)]
    pub date_time: Option<DateTime<Utc>>,
    pub amount: f64,
    pub currency: Option<String>,
    /// Payment provider payload.
    pub invoice_data: Option<serde_json::Value>,
    pub note: Option<String>,
}

impl Entity for InvoiceRecord {
    const NAME: &'static str = "InvoiceRecord";

    fn definition() -> EntityDef {
        EntityDef::new(Self::NAME)
            .with_fields([
                FieldDef::optional("payer_email", FieldType::String),
                FieldDef::optional("payer_name", FieldType::String),
                FieldDef::new("premium_count", FieldType::Int).with_default(DefaultValue::Int(0)),
                FieldDef::optional("item_id", FieldType::Id),
                FieldDef::optional("user_id", FieldType::Id),
                FieldDef::new("date_time", FieldType::Timestamp)
                    .with_default(DefaultValue::CurrentTimestamp),
                FieldDef::new("amount", FieldType::Float),
                FieldDef::optional("currency", FieldType::String),
                FieldDef::optional("invoice_data", FieldType::Json),
                FieldDef::optional("note", FieldType::String),
            ])
            .references("item_id", Item::NAME)
            .references("user_id", User::NAME)
            .with_constraint(ConstraintDef::at_least_one(
                "invoice_owner",
                ["item_id", "user_id"],
            ))
    }
}

/// View counter of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemCounterRecord {
    pub item_id: Id,
    #[serde(default)]
    pub date_time: Option<DateTime<Utc>>,
    pub count: i64,
    pub note: Option<String>,
}

impl Entity for ItemCounterRecord {
    const NAME: &'static str = "ItemCounterRecord";

    fn definition() -> EntityDef {
        EntityDef::new(Self::NAME)
            .with_fields([
                FieldDef::new("item_id", FieldType::Id),
                FieldDef::new("date_time", FieldType::Timestamp)
                    .with_default(DefaultValue::CurrentTimestamp),
                FieldDef::new("count", FieldType::Int).with_default(DefaultValue::Int(0)),
                FieldDef::optional("note", FieldType::String),
            ])
            .references("item_id", Item::NAME)
            .with_constraint(ConstraintDef::unique("unique_item_counter_record", "item_id"))
    }
}

/// An image attached to an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemImageRecord {
    pub item_id: Id,
    #[serde(default)]
    pub date_time: Option<DateTime<Utc>>,
    pub url: String,
    pub note: Option<String>,
}

impl Entity for ItemImageRecord {
    const NAME: &'static str = "ItemImageRecord";

    fn definition() -> EntityDef {
        EntityDef::new(Self::NAME)
            .with_fields([
                FieldDef::new("item_id", FieldType::Id),
                FieldDef::new("date_time", FieldType::Timestamp)
                    .with_default(DefaultValue::CurrentTimestamp),
                FieldDef::new("url", FieldType::String),
                FieldDef::optional("note", FieldType::String),
            ])
            .references("item_id", Item::NAME)
            .with_constraint(ConstraintDef::unique_composite(
                "unique_item_image_record",
                ["item_id", "url"],
            ))
    }
}

/// A dated snapshot of an item's view count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemHistoryRecord {
    pub item_id: Id,
    #[serde(default)]
    pub date_time: Option<DateTime<Utc>>,
    pub count: i64,
    pub note: Option<String>,
}

impl Entity for ItemHistoryRecord {
    const NAME: &'static str = "ItemHistoryRecord";

    fn definition() -> EntityDef {
        EntityDef::new(Self::NAME)
            .with_fields([
                FieldDef::new("item_id", FieldType::Id),
                FieldDef::new("date_time", FieldType::Timestamp)
                    .with_default(DefaultValue::CurrentTimestamp),
                FieldDef::new("count", FieldType::Int).with_default(DefaultValue::Int(0)),
                FieldDef::optional("note", FieldType::String),
            ])
            .references("item_id", Item::NAME)
    }
}
