//! Maxbazar command-line tool.
//!
//! Inspects and edits a Maxbazar store on disk. All integrity rules are
//! enforced by `maxbazar-core`; this binary only parses and prints.

mod commands;
mod formatter;

use std::path::PathBuf;

use clap::Parser;
use formatter::OutputFormat;
use maxbazar_core::{marketplace_registry, StorageConfig, Store};
use tracing_subscriber::EnvFilter;

/// Maxbazar command-line tool
#[derive(Parser, Debug)]
#[command(name = "maxbazar")]
#[command(version, about = "Maxbazar data model administration")]
pub struct Args {
    /// Store directory
    #[arg(short = 'd', long, default_value = "./maxbazar_data")]
    pub data_path: PathBuf,

    /// Use a throwaway in-memory store
    #[arg(long)]
    pub temporary: bool,

    /// Output format
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: commands::Command,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("maxbazar=info,maxbazar_core=info")
        }))
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = if args.temporary {
        StorageConfig::temporary()
    } else {
        StorageConfig::new(&args.data_path)
    };

    let store = Store::open(config, marketplace_registry()?)?;
    let formatter = formatter::create_formatter(args.format);

    let output = commands::execute(&store, args.command, &*formatter)?;
    println!("{}", output);

    store.flush()?;
    Ok(())
}
