//! Output formatters for rows and schema information.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use maxbazar_core::lifecycle::value_to_json;
use maxbazar_core::{ConstraintDef, Dependent, EntityDef, Error, Id, Row, Value};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter {
    /// Format rows of one entity; `total` counts matches beyond the page.
    fn format_rows(&self, entity: &EntityDef, rows: &[Row], total: usize) -> Result<String, Error>;

    /// Format the list of defined entities.
    fn format_entities(&self, names: &[&str], schema_version: u64) -> String;

    /// Format one entity's declaration.
    fn format_entity(&self, entity: &EntityDef) -> String;

    /// Format rows referencing another row.
    fn format_dependents(&self, dependents: &[Dependent]) -> String;

    /// Format a list of ids under a column name.
    fn format_ids(&self, label: &str, ids: &[Id]) -> String;

    /// Format a simple message.
    fn format_message(&self, message: &str) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Csv => Box::new(CsvFormatter),
    }
}

/// Column headers for an entity: envelope first, then declared fields.
fn headers(entity: &EntityDef) -> Vec<&str> {
    let mut headers = vec!["id", "created_at", "updated_at", "deleted_at"];
    headers.extend(entity.fields.iter().map(|f| f.name.as_str()));
    headers
}

/// Cell values of a row, aligned with [`headers`].
fn cells(entity: &EntityDef, row: &Row) -> Result<Vec<String>, Error> {
    let mut cells = vec![
        row.id.to_string(),
        display(&Value::Timestamp(row.created_at))?,
        display(&Value::Timestamp(row.updated_at))?,
        display(&row.deleted_at.map(Value::Timestamp).unwrap_or(Value::Null))?,
    ];
    for field in &entity.fields {
        cells.push(display(row.fields.get(&field.name).unwrap_or(&Value::Null))?);
    }
    Ok(cells)
}

fn display(value: &Value) -> Result<String, Error> {
    Ok(match value_to_json(value)? {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

fn row_to_json(entity: &EntityDef, row: &Row) -> Result<serde_json::Value, Error> {
    let mut obj = serde_json::Map::new();
    obj.insert("id".into(), row.id.get().into());
    obj.insert("created_at".into(), value_to_json(&Value::Timestamp(row.created_at))?);
    obj.insert("updated_at".into(), value_to_json(&Value::Timestamp(row.updated_at))?);
    obj.insert(
        "deleted_at".into(),
        value_to_json(&row.deleted_at.map(Value::Timestamp).unwrap_or(Value::Null))?,
    );
    for field in &entity.fields {
        let value = row.fields.get(&field.name).unwrap_or(&Value::Null);
        obj.insert(field.name.clone(), value_to_json(value)?);
    }
    Ok(serde_json::Value::Object(obj))
}

fn describe_constraint(constraint: &ConstraintDef) -> (String, String, String) {
    match constraint {
        ConstraintDef::Unique {
            name,
            fields,
            nulls_distinct,
        } => {
            let kind = if *nulls_distinct {
                "unique"
            } else {
                "unique (nulls not distinct)"
            };
            (name.clone(), kind.to_string(), fields.join(", "))
        }
        ConstraintDef::ForeignKey {
            name,
            field,
            references,
            acyclic,
        } => {
            let kind = if *acyclic { "tree parent" } else { "foreign key" };
            (name.clone(), kind.to_string(), format!("{field} -> {references}"))
        }
        ConstraintDef::OneOf {
            name,
            fields,
            exclusive,
        } => {
            let kind = if *exclusive { "exactly one" } else { "at least one" };
            (name.clone(), kind.to_string(), fields.join(", "))
        }
        ConstraintDef::Hierarchy {
            name,
            depth,
            enabled,
            leaves,
        } => (
            name.clone(),
            "hierarchy".to_string(),
            format!("depth {depth}, enabled {enabled}, leaves {leaves}"),
        ),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_rows(&self, entity: &EntityDef, rows: &[Row], total: usize) -> Result<String, Error> {
        let mut table = Table::new();
        table.set_header(headers(entity));
        for row in rows {
            table.add_row(cells(entity, row)?);
        }
        Ok(format!("{}\n{} of {} row(s)", table, rows.len(), total))
    }

    fn format_entities(&self, names: &[&str], schema_version: u64) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Entity"]);
        for name in names {
            table.add_row(vec![Cell::new(name)]);
        }
        format!("{}\nschema version {}", table, schema_version)
    }

    fn format_entity(&self, entity: &EntityDef) -> String {
        let mut fields = Table::new();
        fields.set_header(vec!["Field", "Type", "Required", "Default"]);
        for field in &entity.fields {
            fields.add_row(vec![
                Cell::new(&field.name),
                Cell::new(field.field_type.name()),
                Cell::new(if field.required { "yes" } else { "no" }),
                Cell::new(
                    field
                        .default
                        .as_ref()
                        .map(|d| format!("{d:?}"))
                        .unwrap_or_default(),
                ),
            ]);
        }

        let mut constraints = Table::new();
        constraints.set_header(vec!["Constraint", "Kind", "Fields"]);
        for constraint in &entity.constraints {
            let (name, kind, fields) = describe_constraint(constraint);
            constraints.add_row(vec![name, kind, fields]);
        }

        format!("{}\n\n{}\n\n{}", entity.name, fields, constraints)
    }

    fn format_dependents(&self, dependents: &[Dependent]) -> String {
        if dependents.is_empty() {
            return "No dependents".to_string();
        }
        let mut table = Table::new();
        table.set_header(vec!["Entity", "Field", "Id"]);
        for d in dependents {
            table.add_row(vec![d.entity.clone(), d.field.clone(), d.id.to_string()]);
        }
        table.to_string()
    }

    fn format_ids(&self, label: &str, ids: &[Id]) -> String {
        let mut table = Table::new();
        table.set_header(vec![label]);
        for id in ids {
            table.add_row(vec![id.to_string()]);
        }
        table.to_string()
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_rows(&self, entity: &EntityDef, rows: &[Row], total: usize) -> Result<String, Error> {
        let items = rows
            .iter()
            .map(|row| row_to_json(entity, row))
            .collect::<Result<Vec<_>, _>>()?;
        let output = serde_json::json!({
            "entity": entity.name,
            "items": items,
            "total": total,
        });
        Ok(pretty(&output))
    }

    fn format_entities(&self, names: &[&str], schema_version: u64) -> String {
        pretty(&serde_json::json!({
            "schema_version": schema_version,
            "entities": names,
        }))
    }

    fn format_entity(&self, entity: &EntityDef) -> String {
        let fields: Vec<_> = entity
            .fields
            .iter()
            .map(|f| {
                serde_json::json!({
                    "name": f.name,
                    "type": f.field_type.name(),
                    "required": f.required,
                    "default": f.default.as_ref().map(|d| format!("{d:?}")),
                })
            })
            .collect();
        let constraints: Vec<_> = entity
            .constraints
            .iter()
            .map(|c| {
                let (name, kind, fields) = describe_constraint(c);
                serde_json::json!({"name": name, "kind": kind, "fields": fields})
            })
            .collect();

        pretty(&serde_json::json!({
            "entity": entity.name,
            "fields": fields,
            "constraints": constraints,
        }))
    }

    fn format_dependents(&self, dependents: &[Dependent]) -> String {
        let items: Vec<_> = dependents
            .iter()
            .map(|d| serde_json::json!({"entity": d.entity, "field": d.field, "id": d.id}))
            .collect();
        pretty(&serde_json::Value::Array(items))
    }

    fn format_ids(&self, label: &str, ids: &[Id]) -> String {
        pretty(&serde_json::json!({ label: ids }))
    }

    fn format_message(&self, message: &str) -> String {
        pretty(&serde_json::json!({ "message": message }))
    }
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// CSV formatter.
pub struct CsvFormatter;

impl Formatter for CsvFormatter {
    fn format_rows(
        &self,
        entity: &EntityDef,
        rows: &[Row],
        _total: usize,
    ) -> Result<String, Error> {
        let mut lines = vec![headers(entity).join(",")];
        for row in rows {
            let line: Vec<String> = cells(entity, row)?.iter().map(|c| escape_csv(c)).collect();
            lines.push(line.join(","));
        }
        Ok(lines.join("\n"))
    }

    fn format_entities(&self, names: &[&str], _schema_version: u64) -> String {
        let mut lines = vec!["entity".to_string()];
        lines.extend(names.iter().map(|n| n.to_string()));
        lines.join("\n")
    }

    fn format_entity(&self, entity: &EntityDef) -> String {
        let mut lines = vec!["field,type,required".to_string()];
        for field in &entity.fields {
            lines.push(format!(
                "{},{},{}",
                field.name,
                field.field_type.name(),
                field.required
            ));
        }
        lines.join("\n")
    }

    fn format_dependents(&self, dependents: &[Dependent]) -> String {
        let mut lines = vec!["entity,field,id".to_string()];
        for d in dependents {
            lines.push(format!("{},{},{}", d.entity, d.field, d.id));
        }
        lines.join("\n")
    }

    fn format_ids(&self, label: &str, ids: &[Id]) -> String {
        let mut lines = vec![label.to_string()];
        lines.extend(ids.iter().map(Id::to_string));
        lines.join("\n")
    }

    fn format_message(&self, message: &str) -> String {
        format!("message\n{}", escape_csv(message))
    }
}

/// Quote a CSV cell when needed.
fn escape_csv(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maxbazar_core::lifecycle::Entity;
    use maxbazar_core::model::Setting;
    use maxbazar_core::Fields;

    fn row() -> Row {
        let mut fields = Fields::new();
        fields.insert("name".into(), "motd".into());
        fields.insert("value".into(), "Hello, world".into());
        fields.insert("enabled".into(), Value::Bool(true));
        fields.insert("note".into(), Value::Null);
        Row {
            id: Id(1),
            created_at: 1_704_067_200_000_000,
            updated_at: 1_704_067_200_000_000,
            deleted_at: None,
            fields,
        }
    }

    #[test]
    fn test_csv_quotes_commas() {
        let out = CsvFormatter
            .format_rows(&Setting::definition(), &[row()], 1)
            .unwrap();
        let mut lines = out.lines();
        assert_eq!(
            lines.next(),
            Some("id,created_at,updated_at,deleted_at,name,value,enabled,note")
        );
        let data = lines.next().unwrap();
        assert!(data.starts_with("1,2024-01-01T00:00:00Z,"));
        assert!(data.contains("\"Hello, world\""));
    }

    #[test]
    fn test_json_rows() {
        let out = JsonFormatter
            .format_rows(&Setting::definition(), &[row()], 5)
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["total"], 5);
        assert_eq!(parsed["items"][0]["name"], "motd");
        assert_eq!(parsed["items"][0]["deleted_at"], serde_json::Value::Null);
    }

    #[test]
    fn test_table_lists_entities() {
        let out = TableFormatter.format_entities(&["User", "Item"], 1);
        assert!(out.contains("User"));
        assert!(out.ends_with("schema version 1"));
    }

    #[test]
    fn test_describes_item_type_hierarchy() {
        let def = maxbazar_core::model::ItemType::definition();
        let tree = def
            .constraints
            .iter()
            .find(|c| c.name() == "item_type_tree")
            .unwrap();

        let (_, kind, fields) = describe_constraint(tree);
        assert_eq!(kind, "hierarchy");
        assert!(fields.contains("final_item_type_ids"));
        assert!(TableFormatter.format_entity(&def).contains("item_type_tree"));
    }
}
