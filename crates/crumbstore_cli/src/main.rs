//! CrumbStore CLI
//!
//! Command-line tools for breadcrumb log files.
//!
//! # Commands
//!
//! - `dump` - Print every retained breadcrumb
//! - `inspect` - Display ring statistics
//! - `add` - Append a breadcrumb
//! - `clear` - Drop every breadcrumb
//!
//! `--path` names the log file itself, or with `--dir` an application
//! directory holding `breadcrumbs/bt-breadcrumbs-0`.

mod commands;

use clap::{Parser, Subcommand};
use crumbstore_core::breadcrumb_log_path;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// CrumbStore breadcrumb log tools.
#[derive(Parser)]
#[command(name = "crumbstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the breadcrumb log file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Treat --path as an application directory
    #[arg(global = true, short, long)]
    dir: bool,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every retained breadcrumb, oldest first
    Dump {
        /// Maximum number of breadcrumbs to print, newest kept
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Display ring statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Append a breadcrumb
    Add {
        /// Breadcrumb message
        message: String,

        /// Attribute as key=value (repeatable)
        #[arg(short, long = "attr", value_parser = commands::add::parse_attribute)]
        attributes: Vec<(String, String)>,

        /// Breadcrumb type
        #[arg(short = 't', long = "type", default_value = "manual")]
        kind: String,

        /// Breadcrumb level
        #[arg(short, long, default_value = "info")]
        level: String,

        /// Ring capacity in bytes for a new log
        #[arg(short, long)]
        capacity: Option<u32>,
    },

    /// Drop every breadcrumb, leaving a configuration breadcrumb
    Clear,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let log_path = |command: &str| -> Result<PathBuf, String> {
        let path = cli
            .path
            .clone()
            .ok_or_else(|| format!("Log path required for {command}"))?;
        Ok(if cli.dir {
            breadcrumb_log_path(path)
        } else {
            path
        })
    };

    match cli.command {
        Commands::Dump { limit, ref format } => {
            let path = log_path("dump")?;
            commands::dump::run(&path, limit, format, &mut std::io::stdout().lock())?;
        }
        Commands::Inspect { ref format } => {
            let path = log_path("inspect")?;
            commands::inspect::run(&path, format)?;
        }
        Commands::Add {
            ref message,
            ref attributes,
            ref kind,
            ref level,
            capacity,
        } => {
            let path = log_path("add")?;
            let id = commands::add::run(&path, message, attributes, kind, level, capacity)?;
            println!("Added {id}");
        }
        Commands::Clear => {
            let path = log_path("clear")?;
            commands::clear::run(&path)?;
        }
        Commands::Version => {
            println!("CrumbStore CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("CrumbStore Core v{}", crumbstore_core::VERSION);
        }
    }

    Ok(())
}
