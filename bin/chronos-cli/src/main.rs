//! Chronos CLI - Metadata inspection tool
//!
//! This binary loads a metadata catalog into an in-memory backend and
//! inspects schemas, properties and chronicles through the metadata layer.

mod catalog;
mod commands;

use anyhow::{Context, Result};
use catalog::Catalog;
use chronos_common::{Config, DatabaseId};
use chronos_meta::{MemoryStore, MetaDatabase};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "chronos-cli")]
#[command(about = "Chronos metadata CLI")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "chronos.toml")]
    config: PathBuf,

    /// Catalog of metadata objects to load (JSON)
    #[arg(long, env = "CHRONOS_CATALOG")]
    catalog: Option<PathBuf>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,

    /// Maximum number of cached chronicles
    #[arg(long)]
    cache_capacity: Option<usize>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Schema operations
    Schema {
        #[command(subcommand)]
        action: SchemaCommands,
    },
    /// Chronicle operations
    Chronicle {
        #[command(subcommand)]
        action: ChronicleCommands,
    },
    /// Property operations
    Property {
        #[command(subcommand)]
        action: PropertyCommands,
    },
}

#[derive(Subcommand, Debug)]
enum SchemaCommands {
    /// List schema names
    List {
        /// Name pattern, `*` matches any run of characters
        #[arg(default_value = "*")]
        pattern: String,
    },
    /// Show a schema merged with its bases
    Show {
        /// Schema name
        name: String,
    },
    /// Resolve a schema, failing if it is incomplete
    Check {
        /// Schema name
        name: String,
    },
    /// List the schemas a schema is resolved from
    Dependencies {
        /// Schema name
        name: String,
    },
}

#[derive(Subcommand, Debug)]
enum ChronicleCommands {
    /// Show a chronicle and its resolved schema
    Show {
        /// Full chronicle name
        full_name: String,
    },
    /// Load every catalog chronicle and show cache sharing
    Stats,
}

#[derive(Subcommand, Debug)]
enum PropertyCommands {
    /// List properties, built-in ones included
    List {
        /// Name pattern, `*` matches any run of characters
        #[arg(default_value = "*")]
        pattern: String,
    },
}

/// Read the configuration file if present and apply command line overrides
fn load_config(args: &Args) -> Result<Config> {
    let mut config = if args.config.exists() {
        let text = std::fs::read_to_string(&args.config)
            .with_context(|| format!("failed to read {}", args.config.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("failed to parse {}", args.config.display()))?
    } else {
        Config::default()
    };

    if let Some(level) = &args.log_level {
        config.logging.level.clone_from(level);
    }
    if let Some(capacity) = args.cache_capacity {
        config.cache.capacity = capacity;
    }
    config.validate()?;
    Ok(config)
}

fn open_database(config: &Config, catalog: Option<&Path>) -> Result<(MetaDatabase, Catalog)> {
    let store = Arc::new(MemoryStore::new(DatabaseId::new()));
    let db = MetaDatabase::new(store, config)?;
    let catalog = match catalog {
        Some(path) => Catalog::from_file(path)?,
        None => Catalog::default(),
    };
    catalog.load_into(&db)?;
    Ok((db, catalog))
}

fn run(command: Commands, db: &MetaDatabase, catalog: &Catalog, json: bool) -> Result<String> {
    match command {
        Commands::Schema { action } => match action {
            SchemaCommands::List { pattern } => {
                commands::emit(json, &commands::list_schemas(db, &pattern)?)
            }
            SchemaCommands::Show { name } => {
                commands::emit(json, &commands::show_schema(db, &name)?)
            }
            SchemaCommands::Check { name } => {
                commands::emit(json, &commands::check_schema(db, &name)?)
            }
            SchemaCommands::Dependencies { name } => {
                commands::emit(json, &commands::schema_dependencies(db, &name)?)
            }
        },
        Commands::Chronicle { action } => match action {
            ChronicleCommands::Show { full_name } => {
                commands::emit(json, &commands::show_chronicle(db, &full_name)?)
            }
            ChronicleCommands::Stats => {
                let names: Vec<String> =
                    catalog.chronicles.iter().map(|c| c.name.clone()).collect();
                commands::emit(json, &commands::cache_stats(db, &names)?)
            }
        },
        Commands::Property { action } => match action {
            PropertyCommands::List { pattern } => {
                commands::emit(json, &commands::list_properties(db, &pattern)?)
            }
        },
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();
    let config = load_config(&args)?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    debug!(?config, "loaded configuration");
    let (db, catalog) = open_database(&config, args.catalog.as_deref())?;
    info!(capacity = db.cache().capacity(), "metadata database ready");

    let output = run(args.command, &db, &catalog, args.json)?;
    print!("{output}");
    Ok(())
}
