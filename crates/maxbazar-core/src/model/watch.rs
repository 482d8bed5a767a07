//! Price-drop alarms and watchlists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Item, ItemType, User};
use crate::catalog::{ConstraintDef, DefaultValue, EntityDef, FieldDef, FieldType};
use crate::lifecycle::Entity;
use crate::value::Id;

/// A user's subscription to new listings in a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemAlarmRecord {
    pub user_id: Id,
    pub item_type_id: Id,
    /// Match criteria, owned by the notification feature.
    pub item_data: Option<serde_json::Value>,
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: DateTime<Utc>,
    pub note: Option<String>,
}

impl Entity for ItemAlarmRecord {
    const NAME: &'static str = "ItemAlarmRecord";

    fn definition() -> EntityDef {
        EntityDef::new(Self::NAME)
            .with_fields([
                FieldDef::new("user_id", FieldType::Id),
                FieldDef::new("item_type_id", FieldType::Id),
                FieldDef::optional("item_data", FieldType::Json),
                FieldDef::new("start_date_time", FieldType::Timestamp),
                FieldDef::new("end_date_time", FieldType::Timestamp),
                FieldDef::optional("note", FieldType::String),
            ])
            .references("user_id", User::NAME)
            .references("item_type_id", ItemType::NAME)
            .with_constraint(ConstraintDef::unique_composite(
                "unique_user_alarm_record",
                ["item_type_id", "user_id"],
            ))
    }
}

/// Kind of watchlist, e.g. favourites or price watch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistType {
    pub name: String,
    pub note: Option<String>,
}

impl Entity for WatchlistType {
    const NAME: &'static str = "WatchlistType";

    fn definition() -> EntityDef {
        EntityDef::new(Self::NAME)
            .with_fields([
                FieldDef::new("name", FieldType::String),
                FieldDef::optional("note", FieldType::String),
            ])
            .with_constraint(ConstraintDef::unique("unique_watchlist_type", "name"))
    }
}

/// What a watchlist entry follows.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchTarget {
    /// A single listing.
    Item(Id),
    /// Every listing in a category.
    Category(Id),
    /// Listings matching saved search criteria.
    Filter(serde_json::Value),
}

/// A watchlist entry. Exactly one of `item_id`, `item_type_id` and `data` is
/// set; use [`target`](Self::target) to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemWatchlistRecord {
    pub user_id: Id,
    pub watchlist_type_id: Id,
    pub item_id: Option<Id>,
    pub item_type_id: Option<Id>,
    pub data: Option<serde_json::Value>,
    pub email_sent: bool,
    pub email_sent_date_time: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

impl ItemWatchlistRecord {
    /// A new entry following `target`.
    pub fn new(user_id: Id, watchlist_type_id: Id, target: WatchTarget) -> Self {
        let mut record = Self {
            user_id,
            watchlist_type_id,
            item_id: None,
            item_type_id: None,
            data: None,
            email_sent: false,
            email_sent_date_time: None,
            note: None,
        };
        record.set_target(target);
        record
    }

    /// The followed target, or `None` if the row does not name exactly one.
    pub fn target(&self) -> Option<WatchTarget> {
        match (self.item_id, self.item_type_id, &self.data) {
            (Some(id), None, None) => Some(WatchTarget::Item(id)),
            (None, Some(id), None) => Some(WatchTarget::Category(id)),
            (None, None, Some(data)) => Some(WatchTarget::Filter(data.clone())),
            _ => None,
        }
    }

    /// Replace the followed target.
    pub fn set_target(&mut self, target: WatchTarget) {
        self.item_id = None;
        self.item_type_id = None;
        self.data = None;
        match target {
            WatchTarget::Item(id) => self.item_id = Some(id),
            WatchTarget::Category(id) => self.item_type_id = Some(id),
            WatchTarget::Filter(data) => self.data = Some(data),
        }
    }
}

impl Entity for ItemWatchlistRecord {
    const NAME: &'static str = "ItemWatchlistRecord";

    fn definition() -> EntityDef {
        EntityDef::new(Self::NAME)
            .with_fields([
                FieldDef::new("user_id", FieldType::Id),
                FieldDef::new("watchlist_type_id", FieldType::Id),
                FieldDef::optional("item_id", FieldType::Id),
                FieldDef::optional("item_type_id", FieldType::Id),
                FieldDef::optional("data", FieldType::Json),
                FieldDef::new("email_sent", FieldType::Bool)
                    .with_default(DefaultValue::Bool(false)),
                FieldDef::optional("email_sent_date_time", FieldType::Timestamp),
                FieldDef::optional("note", FieldType::String),
            ])
            .references("user_id", User::NAME)
            .references("watchlist_type_id", WatchlistType::NAME)
            .references("item_id", Item::NAME)
            .references("item_type_id", ItemType::NAME)
            .with_constraint(ConstraintDef::exactly_one(
                "watch_target",
                ["item_id", "item_type_id", "data"],
            ))
            .with_constraint(ConstraintDef::unique_composite(
                "unique_user_item_watchlist_record",
                ["user_id", "item_id", "watchlist_type_id"],
            ))
            .with_constraint(ConstraintDef::unique_composite(
                "unique_user_data_watchlist_record",
                ["user_id", "watchlist_type_id", "item_type_id"],
            ))
            .with_constraint(ConstraintDef::unique_composite(
                "unique_user_filter_watchlist_record",
                ["user_id", "watchlist_type_id", "data"],
            ))
    }
}
