//! dbproto CLI
//!
//! Command-line tools for dbproto databases.
//!
//! # Commands
//!
//! - `list` - list databases, a database's tables, or a table's records
//! - `export` - export a table to CSV or XML
//! - `backup` - write `backup.zip` for every database
//! - `restore` - restore every database from `backup.zip`
//!
//! The AES key is read from `AES_KEY` (or `MASTER_AES_KEY`); a missing
//! or malformed key exits non-zero before anything touches disk.

mod commands;

use clap::{Parser, Subcommand};
use commands::export::ExportFormat;
use dbproto_core::{Server, ServerConfig};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// dbproto command-line database tools.
#[derive(Parser)]
#[command(name = "dbproto")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List databases, tables within a database, or records within a table
    List {
        /// Database name
        database: Option<String>,

        /// Table name
        table: Option<String>,
    },

    /// Export all records of a table to a file
    Export {
        /// Database name
        database: String,

        /// Table name
        table: String,

        /// Output file path
        file: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,
    },

    /// Write a zip backup of every database
    Backup,

    /// Restore every database from the latest backup
    Restore,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;
    let server = Server::new(config);
    server.initialize()?;

    match cli.command {
        Commands::List { database, table } => {
            commands::list::run(&server, database.as_deref(), table.as_deref())?;
        }
        Commands::Export {
            database,
            table,
            file,
            format,
        } => {
            commands::export::run(&server, &database, &table, &file, format)?;
        }
        Commands::Backup => commands::backup::create(&server)?,
        Commands::Restore => commands::backup::restore(&server)?,
    }

    Ok(())
}
