//! TabulaKV CLI
//!
//! Command-line access to the tables of a local store.

use std::process;

use clap::{Parser, Subcommand};
use tabulakv::{Config, KeySpec, QualifiedTableName, Schema, Store, TableHandle, TypeTag};
use tracing_subscriber::{fmt, EnvFilter};

/// TabulaKV CLI
#[derive(Parser, Debug)]
#[command(name = "tabula-cli")]
#[command(about = "CLI for TabulaKV table stores")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./tabulakv_data")]
    data_dir: String,

    /// Prefix applied to every table scope (e.g. a port)
    #[arg(short = 'p', long)]
    scope_prefix: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered tables
    Tables,

    /// Get a value by key
    Get {
        scope: String,
        table: String,
        key: String,
    },

    /// Set a key-value pair
    Put {
        scope: String,
        table: String,
        key: String,
        value: String,
    },

    /// Delete a key, only if it currently holds the given value
    Del {
        scope: String,
        table: String,
        key: String,
        expected: String,
    },

    /// Print every pair in a table
    Scan { scope: String, table: String },

    /// Print the number of rows in a table
    Count { scope: String, table: String },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tabulakv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        process::exit(if e.is_fatal() { 2 } else { 1 });
    }
}

/// Raw two-column table: byte-string key, byte-string value
fn raw_schema() -> Schema {
    Schema::new(KeySpec::new([0]), [TypeTag::Bytes, TypeTag::Bytes])
}

fn open(store: &Store, scope: &str, table: &str) -> tabulakv::Result<TableHandle> {
    store.open_table(&QualifiedTableName::new(scope, table), raw_schema())
}

fn run(args: Args) -> tabulakv::Result<()> {
    let mut builder = Config::builder().data_dir(&args.data_dir);
    if let Some(prefix) = args.scope_prefix {
        builder = builder.scope_prefix(prefix);
    }
    let store = Store::open(builder.build())?;

    match args.command {
        Commands::Tables => {
            for entry in store.tables()? {
                let types: Vec<&str> = entry.schema.column_types.iter().map(|t| t.as_str()).collect();
                println!(
                    "{}\t{}\tkey={:?}\ttypes=[{}]",
                    entry.name,
                    entry.locator,
                    entry.schema.key.columns(),
                    types.join(", ")
                );
            }
        }
        Commands::Get { scope, table, key } => {
            let handle = open(&store, &scope, &table)?;
            match handle.get(key.as_bytes())? {
                Some(value) => println!("{}", String::from_utf8_lossy(&value)),
                None => println!("(nil)"),
            }
        }
        Commands::Put { scope, table, key, value } => {
            let handle = open(&store, &scope, &table)?;
            let changed = handle.put(key.as_bytes(), value.as_bytes())?;
            println!("{}", if changed { "OK" } else { "UNCHANGED" });
        }
        Commands::Del { scope, table, key, expected } => {
            let handle = open(&store, &scope, &table)?;
            let removed = handle.remove(key.as_bytes(), expected.as_bytes())?;
            println!("{}", if removed { "DELETED" } else { "NOT DELETED" });
        }
        Commands::Scan { scope, table } => {
            let handle = open(&store, &scope, &table)?;
            for pair in handle.scan()? {
                let (key, value) = pair?;
                println!(
                    "{}\t{}",
                    String::from_utf8_lossy(&key),
                    String::from_utf8_lossy(&value)
                );
            }
        }
        Commands::Count { scope, table } => {
            let handle = open(&store, &scope, &table)?;
            println!("{}", handle.count()?);
        }
    }

    store.close()
}
