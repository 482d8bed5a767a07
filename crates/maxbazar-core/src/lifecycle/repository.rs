//! Typed access to entities.
//!
//! Entity structs are plain `serde` types; the repository converts them to
//! and from field maps guided by the entity definition. Timestamps travel as
//! `chrono::DateTime<Utc>`, JSON payload fields as `serde_json::Value`.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number};

use super::filter::{Filter, Page, Pagination};
use super::store::{Row, Store};
use crate::catalog::{EntityDef, FieldType};
use crate::error::{Error, FieldViolation};
use crate::value::{exact_micros, Fields, Id, Value};

/// A typed entity with a registered shape.
pub trait Entity: Serialize + DeserializeOwned {
    /// Registry name of the entity.
    const NAME: &'static str;

    /// Field, constraint and default declarations.
    fn definition() -> EntityDef;
}

/// A typed entity together with its envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    /// Surrogate identifier.
    pub id: Id,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete time.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Entity fields.
    pub data: T,
}

/// Typed facade over [`Store`] for one entity type.
pub struct Repository<'a, T> {
    store: &'a Store,
    def: &'a EntityDef,
    _entity: PhantomData<fn() -> T>,
}

impl Store {
    /// Typed access to entity `T`.
    pub fn repository<T: Entity>(&self) -> Result<Repository<'_, T>, Error> {
        Ok(Repository {
            store: self,
            def: self.registry().require(T::NAME)?,
            _entity: PhantomData,
        })
    }
}

impl<T: Entity> Repository<'_, T> {
    /// Insert `entity`. Unset optional fields take their defaults.
    pub fn create(&self, entity: &T) -> Result<Id, Error> {
        let mut fields = to_fields(self.def, entity)?;
        fields.retain(|_, v| !v.is_null());
        self.store.create(T::NAME, fields)
    }

    /// Fetch an active row.
    pub fn get(&self, id: Id) -> Result<Stored<T>, Error> {
        self.typed(self.store.get(T::NAME, id)?)
    }

    /// Fetch a row even if soft-deleted.
    pub fn get_with_deleted(&self, id: Id) -> Result<Stored<T>, Error> {
        self.typed(self.store.get_with_deleted(T::NAME, id)?)
    }

    /// List active rows matching `filter`.
    pub fn list(&self, filter: &Filter, pagination: Pagination) -> Result<Page<Stored<T>>, Error> {
        self.store
            .list(T::NAME, filter, pagination)?
            .try_map(|row| self.typed(row))
    }

    /// Replace every field of an active row with those of `entity`.
    pub fn update(&self, id: Id, entity: &T) -> Result<Stored<T>, Error> {
        self.patch(id, to_fields(self.def, entity)?)
    }

    /// Merge a partial field map into an active row.
    pub fn patch(&self, id: Id, patch: Fields) -> Result<Stored<T>, Error> {
        self.typed(self.store.update(T::NAME, id, patch)?)
    }

    /// Soft-delete an active row.
    pub fn soft_delete(&self, id: Id) -> Result<(), Error> {
        self.store.soft_delete(T::NAME, id)
    }

    fn typed(&self, row: Row) -> Result<Stored<T>, Error> {
        let json = fields_to_json(self.def, &row.fields)?;
        let data =
            serde_json::from_value(json).map_err(|e| Error::Deserialization(e.to_string()))?;
        Ok(Stored {
            id: row.id,
            created_at: timestamp(row.created_at)?,
            updated_at: timestamp(row.updated_at)?,
            deleted_at: row.deleted_at.map(timestamp).transpose()?,
            data,
        })
    }
}

fn timestamp(micros: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| Error::InvalidData(format!("timestamp out of range: {micros}")))
}

/// Convert a serializable entity into a field map.
pub fn to_fields<T: Serialize>(def: &EntityDef, entity: &T) -> Result<Fields, Error> {
    let json = serde_json::to_value(entity).map_err(|e| Error::Serialization(e.to_string()))?;
    let serde_json::Value::Object(map) = json else {
        return Err(Error::Serialization(format!(
            "{} does not serialize to an object",
            def.name
        )));
    };
    json_to_fields(def, map)
}

/// Convert a JSON object into a field map, guided by the entity definition.
///
/// Timestamps finer than a microsecond are rejected rather than truncated.
pub fn json_to_fields(
    def: &EntityDef,
    map: Map<String, serde_json::Value>,
) -> Result<Fields, Error> {
    let mut fields = Fields::new();
    let mut violations = Vec::new();
    for (name, value) in map {
        let field_type = def.get_field(&name).map(|f| f.field_type);
        if field_type == Some(FieldType::Timestamp) && is_sub_micro(&value) {
            violations.push(FieldViolation::new(
                name.as_str(),
                "sub-microsecond precision cannot be stored",
            ));
        }
        fields.insert(name, json_to_value(field_type, value));
    }

    if !violations.is_empty() {
        return Err(Error::Validation {
            entity: def.name.clone(),
            violations,
        });
    }
    Ok(fields)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn is_sub_micro(json: &serde_json::Value) -> bool {
    match json {
        serde_json::Value::String(s) => {
            parse_timestamp(s).is_some_and(|at| exact_micros(&at).is_none())
        }
        _ => false,
    }
}

/// Convert a JSON value into a field value, guided by the declared type.
///
/// Values that do not fit the declared type are converted by shape, so the
/// registry reports the mismatch.
pub fn json_to_value(field_type: Option<FieldType>, json: serde_json::Value) -> Value {
    use serde_json::Value as Json;

    match (field_type, json) {
        (_, Json::Null) => Value::Null,
        (Some(FieldType::Json), json) => Value::Json(json),
        (Some(FieldType::Timestamp), Json::String(s)) => {
            match parse_timestamp(&s).as_ref().and_then(exact_micros) {
                Some(micros) => Value::Timestamp(micros),
                None => Value::String(s),
            }
        }
        (Some(FieldType::Id), Json::Number(n)) if n.is_u64() => {
            n.as_u64().map_or(Value::Null, |id| Value::Id(Id(id)))
        }
        (Some(FieldType::Float), Json::Number(n)) => {
            n.as_f64().map_or(Value::Null, Value::Float)
        }
        (_, Json::Bool(b)) => Value::Bool(b),
        (_, Json::Number(n)) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => n.as_f64().map_or(Value::Null, Value::Float),
        },
        (_, Json::String(s)) => Value::String(s),
        (_, json) => Value::Json(json),
    }
}

/// Convert a field map into a JSON object, guided by the entity definition.
pub fn fields_to_json(def: &EntityDef, fields: &Fields) -> Result<serde_json::Value, Error> {
    let mut map = Map::new();
    for (name, value) in fields {
        // Fields dropped from the schema since the row was written are skipped.
        if def.get_field(name).is_none() {
            continue;
        }
        map.insert(name.clone(), value_to_json(value)?);
    }
    Ok(serde_json::Value::Object(map))
}

/// Convert one field value to JSON.
pub fn value_to_json(value: &Value) -> Result<serde_json::Value, Error> {
    use serde_json::Value as Json;

    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::Number((*i).into()),
        Value::Float(f) => Number::from_f64(*f).map_or(Json::Null, Json::Number),
        Value::String(s) => Json::String(s.clone()),
        Value::Timestamp(ts) => serde_json::to_value(timestamp(*ts)?)
            .map_err(|e| Error::Serialization(e.to_string()))?,
        Value::Id(id) => Json::Number(id.get().into()),
        Value::Json(json) => json.clone(),
    })
}
