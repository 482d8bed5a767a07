//! Users and the records exchanged between them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{ConstraintDef, DefaultValue, EntityDef, FieldDef, FieldType};
use crate::lifecycle::Entity;
use crate::value::Id;

/// A marketplace account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub first_name: String,
    pub second_name: String,
    pub email: String,
    /// Credential hash. Never a plain password.
    pub password: Option<String>,
    /// Identity at an external login provider.
    pub external_id: Option<String>,
    pub last_access_time: Option<DateTime<Utc>>,
    pub average_rating: f64,
    pub location: Option<String>,
    pub currency: Option<String>,
    pub phone: Option<String>,
    pub note: Option<String>,
}

impl User {
    /// A user with only the identifying fields set.
    pub fn new(
        first_name: impl Into<String>,
        second_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            second_name: second_name.into(),
            email: email.into(),
            ..Default::default()
        }
    }
}

impl Entity for User {
    const NAME: &'static str = "User";

    fn definition() -> EntityDef {
        EntityDef::new(Self::NAME)
            .with_fields([
                FieldDef::new("first_name", FieldType::String),
                FieldDef::new("second_name", FieldType::String),
                FieldDef::new("email", FieldType::String),
                FieldDef::optional("password", FieldType::String),
                FieldDef::optional("external_id", FieldType::String),
                FieldDef::optional("last_access_time", FieldType::Timestamp),
                FieldDef::new("average_rating", FieldType::Float)
                    .with_default(DefaultValue::Float(0.0)),
                FieldDef::optional("location", FieldType::String),
                FieldDef::optional("currency", FieldType::String),
                FieldDef::optional("phone", FieldType::String),
                FieldDef::optional("note", FieldType::String),
            ])
            .with_constraint(ConstraintDef::unique_composite(
                "unique_user",
                ["first_name", "second_name", "email"],
            ))
    }
}

/// A rating one user gives another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserReviewRecord {
    pub heading: Option<String>,
    pub text: Option<String>,
    /// The reviewed user.
    pub user_in_id: Id,
    /// The reviewer.
    pub user_out_id: Id,
    #[serde(default)]
    pub date_time: Option<DateTime<Utc>>,
    pub rating: f64,
    pub note: Option<String>,
}

impl Entity for UserReviewRecord {
    const NAME: &'static str = "UserReviewRecord";

    fn definition() -> EntityDef {
        EntityDef::new(Self::NAME)
            .with_fields([
                FieldDef::optional("heading", FieldType::String),
                FieldDef::optional("text", FieldType::String),
                FieldDef::new("user_in_id", FieldType::Id),
                FieldDef::new("user_out_id", FieldType::Id),
                FieldDef::new("date_time", FieldType::Timestamp)
                    .with_default(DefaultValue::CurrentTimestamp),
                FieldDef::new("rating", FieldType::Float),
                FieldDef::optional("note", FieldType::String),
            ])
            .references("user_in_id", User::NAME)
            .references("user_out_id", User::NAME)
            .with_constraint(ConstraintDef::unique_composite(
                "unique_user_review_record",
                ["user_in_id", "user_out_id", "date_time"],
            ))
    }
}

/// A message about an item, from one user to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMessageRecord {
    /// Recipient.
    pub user_in_id: Id,
    /// Sender.
    pub user_out_id: Id,
    pub item_id: Id,
    #[serde(default)]
    pub date_time: Option<DateTime<Utc>>,
    pub message: String,
    pub note: Option<String>,
}

impl Entity for UserMessageRecord {
    const NAME: &'static str = "UserMessageRecord";

    fn definition() -> EntityDef {
        EntityDef::new(Self::NAME)
            .with_fields([
                FieldDef::new("user_in_id", FieldType::Id),
                FieldDef::new("user_out_id", FieldType::Id),
                FieldDef::new("item_id", FieldType::Id),
                FieldDef::new("date_time", FieldType::Timestamp)
                    .with_default(DefaultValue::CurrentTimestamp),
                FieldDef::new("message", FieldType::String),
                FieldDef::optional("note", FieldType::String),
            ])
            .references("user_in_id", User::NAME)
            .references("user_out_id", User::NAME)
            .references("item_id", super::Item::NAME)
            .with_constraint(ConstraintDef::unique_composite(
                "unique_user_message_record",
                ["user_in_id", "user_out_id", "item_id", "date_time"],
            ))
    }
}

/// A saved search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFilterRecord {
    pub name: String,
    pub user_id: Id,
    /// Filter criteria, owned by the search feature.
    pub data: Option<serde_json::Value>,
    pub note: Option<String>,
}

impl Entity for UserFilterRecord {
    const NAME: &'static str = "UserFilterRecord";

    fn definition() -> EntityDef {
        EntityDef::new(Self::NAME)
            .with_fields([
                FieldDef::new("name", FieldType::String),
                FieldDef::new("user_id", FieldType::Id),
                FieldDef::optional("data", FieldType::Json),
                FieldDef::optional("note", FieldType::String),
            ])
            .references("user_id", User::NAME)
            .with_constraint(ConstraintDef::unique_composite(
                "unique_user_filter_record",
                ["name", "user_id"],
            ))
    }
}
