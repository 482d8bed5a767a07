//! Subcommands and their execution.

use clap::{Args as ClapArgs, Subcommand};
use maxbazar_core::lifecycle::{json_to_fields, json_to_value};
use maxbazar_core::{
    CategoryTree, EntityDef, Fields, Filter, Id, Pagination, Predicate, SchemaBundle, Store,
};
use thiserror::Error;
use tracing::debug;

use crate::formatter::Formatter;

/// Errors raised while interpreting command-line input.
#[derive(Debug, Error)]
pub enum CliError {
    /// The record argument is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The record argument is valid JSON but not an object.
    #[error("expected a JSON object of field values")]
    NotAnObject,

    /// A `--where` clause could not be parsed.
    #[error("invalid filter `{0}`, expected FIELD=VALUE")]
    InvalidFilter(String),

    /// No schema with this version was recorded.
    #[error("schema version {0} not recorded")]
    UnknownVersion(u64),

    /// The recorded schema has no such entity.
    #[error("entity {entity} not in schema version {version}")]
    UnknownEntity { entity: String, version: u64 },

    /// The store rejected the input.
    #[error(transparent)]
    Store(#[from] maxbazar_core::Error),
}

/// Store operations.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List entities, or describe one entity's fields and constraints
    Schema {
        /// Entity to describe
        entity: Option<String>,
        /// Recorded schema version to read instead of the current one
        #[arg(long)]
        version: Option<u64>,
    },

    /// List recorded schema versions
    Versions,

    /// Show one active row
    Get {
        /// Entity name
        entity: String,
        /// Row id
        id: u64,
        /// Also show soft-deleted rows
        #[arg(long)]
        with_deleted: bool,
    },

    /// List active rows
    List(ListArgs),

    /// Create a row from a JSON object, printing its id
    Create {
        /// Entity name
        entity: String,
        /// Field values, e.g. '{"name": "theme", "value": "dark"}'
        record: String,
    },

    /// Merge a JSON object into a row
    Update {
        /// Entity name
        entity: String,
        /// Row id
        id: u64,
        /// Field values to change; null clears a field
        patch: String,
    },

    /// Soft-delete a row
    Delete {
        /// Entity name
        entity: String,
        /// Row id
        id: u64,
    },

    /// Show active rows referencing a row
    Dependents {
        /// Entity name
        entity: String,
        /// Row id
        id: u64,
    },

    /// Category tree operations
    #[command(subcommand)]
    Categories(CategoryCommand),
}

/// Listing options.
#[derive(ClapArgs, Debug)]
pub struct ListArgs {
    /// Entity name
    pub entity: String,

    /// Equality filter FIELD=VALUE, VALUE parsed as JSON when possible
    #[arg(short = 'w', long = "where")]
    pub filters: Vec<String>,

    /// Only rows where FIELD is null
    #[arg(long = "null")]
    pub nulls: Vec<String>,

    /// Maximum rows to show
    #[arg(short = 'l', long)]
    pub limit: Option<usize>,

    /// Matching rows to skip
    #[arg(short = 'o', long, default_value_t = 0)]
    pub offset: usize,
}

/// Category tree operations.
#[derive(Subcommand, Debug)]
pub enum CategoryCommand {
    /// Enabled leaf categories under a category
    Leaves {
        /// Category id
        id: u64,
    },
    /// Move a category under a new parent, or to the root
    Attach {
        /// Category to move
        child: u64,
        /// New parent; omit to make the category a root
        parent: Option<u64>,
    },
    /// Enable a category
    Enable {
        /// Category id
        id: u64,
    },
    /// Disable a category
    Disable {
        /// Category id
        id: u64,
    },
    /// Recompute cached leaf sets
    Refresh,
}

/// Execute a command against the store and render its output.
pub fn execute(
    store: &Store,
    command: Command,
    formatter: &dyn Formatter,
) -> Result<String, Box<dyn std::error::Error>> {
    debug!(?command, "executing");

    let output = match command {
        Command::Schema { entity, version } => {
            let bundle = recorded_schema(store, version)?;
            match entity {
                None => {
                    let names: Vec<&str> = bundle.names().collect();
                    formatter.format_entities(&names, bundle.version)
                }
                Some(entity) => {
                    let def = bundle.entity(&entity).ok_or_else(|| CliError::UnknownEntity {
                        entity: entity.clone(),
                        version: bundle.version,
                    })?;
                    formatter.format_entity(def)
                }
            }
        }
        Command::Versions => {
            let versions: Vec<String> = store
                .catalog()
                .list_versions()?
                .iter()
                .map(u64::to_string)
                .collect();
            formatter.format_message(&format!(
                "schema versions: {} (current {})",
                versions.join(", "),
                store.schema_version()
            ))
        }
        Command::Get {
            entity,
            id,
            with_deleted,
        } => {
            let row = if with_deleted {
                store.get_with_deleted(&entity, Id(id))?
            } else {
                store.get(&entity, Id(id))?
            };
            formatter.format_rows(store.registry().require(&entity)?, &[row], 1)?
        }
        Command::List(args) => {
            let def = store.registry().require(&args.entity)?;
            let filter = parse_filter(def, &args)?;
            let pagination = Pagination {
                limit: args.limit,
                offset: args.offset,
            };
            let page = store.list(&args.entity, &filter, pagination)?;
            formatter.format_rows(def, &page.items, page.total)?
        }
        Command::Create { entity, record } => {
            let def = store.registry().require(&entity)?;
            let id = store.create(&entity, parse_record(def, &record)?)?;
            formatter.format_message(&format!("created {entity} {id}"))
        }
        Command::Update { entity, id, patch } => {
            let def = store.registry().require(&entity)?;
            let row = store.update(&entity, Id(id), parse_record(def, &patch)?)?;
            formatter.format_rows(def, &[row], 1)?
        }
        Command::Delete { entity, id } => {
            store.soft_delete(&entity, Id(id))?;
            formatter.format_message(&format!("deleted {entity} {id}"))
        }
        Command::Dependents { entity, id } => {
            formatter.format_dependents(&store.dependents(&entity, Id(id))?)
        }
        Command::Categories(command) => execute_category(store, command, formatter)?,
    };

    Ok(output)
}

fn execute_category(
    store: &Store,
    command: CategoryCommand,
    formatter: &dyn Formatter,
) -> Result<String, Box<dyn std::error::Error>> {
    let tree = CategoryTree::new(store)?;

    let output = match command {
        CategoryCommand::Leaves { id } => {
            let leaves: Vec<Id> = tree.resolve_descendant_leaves(Id(id))?.into_iter().collect();
            formatter.format_ids("leaf", &leaves)
        }
        CategoryCommand::Attach { child, parent } => {
            tree.attach(Id(child), parent.map(Id))?;
            match parent {
                Some(parent) => {
                    formatter.format_message(&format!("attached {child} under {parent}"))
                }
                None => formatter.format_message(&format!("{child} is now a root")),
            }
        }
        CategoryCommand::Enable { id } => {
            tree.set_enabled(Id(id), true)?;
            formatter.format_message(&format!("enabled {id}"))
        }
        CategoryCommand::Disable { id } => {
            tree.set_enabled(Id(id), false)?;
            formatter.format_message(&format!("disabled {id}"))
        }
        CategoryCommand::Refresh => {
            let updated = tree.refresh()?;
            formatter.format_message(&format!("{updated} category row(s) repaired"))
        }
    };

    Ok(output)
}

/// The current schema, or the recorded `version` of it.
fn recorded_schema(store: &Store, version: Option<u64>) -> Result<SchemaBundle, CliError> {
    let catalog = store.catalog();
    let version = version.unwrap_or_else(|| catalog.current_version());
    catalog
        .schema_at_version(version)?
        .ok_or(CliError::UnknownVersion(version))
}

/// Parse a JSON object into fields typed by the entity definition.
fn parse_record(def: &EntityDef, input: &str) -> Result<Fields, CliError> {
    let serde_json::Value::Object(map) = serde_json::from_str(input)? else {
        return Err(CliError::NotAnObject);
    };
    Ok(json_to_fields(def, map)?)
}

fn parse_filter(def: &EntityDef, args: &ListArgs) -> Result<Filter, CliError> {
    let mut filter = Filter::new();

    for clause in &args.filters {
        let (field, raw) = clause
            .split_once('=')
            .ok_or_else(|| CliError::InvalidFilter(clause.clone()))?;
        let json = serde_json::from_str(raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
        let field_type = def.get_field(field).map(|f| f.field_type);
        filter = filter.and(Predicate::Eq(field.to_string(), json_to_value(field_type, json)));
    }
    for field in &args.nulls {
        filter = filter.is_null(field.as_str());
    }

    Ok(filter)
}
