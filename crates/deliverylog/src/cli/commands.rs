//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

/// Record one delivery from flags.
#[derive(Debug, Args)]
pub struct RecordCommand {
    /// Delivery date (YYYY-MM-DD); defaults to today
    #[arg(short, long)]
    pub date: Option<String>,

    /// Name of the worker logging the delivery
    #[arg(short, long)]
    pub worker: String,

    /// Name of the truck driver
    #[arg(long)]
    pub driver: String,

    /// Truck plate number
    #[arg(short, long)]
    pub plate: String,

    /// Description of the goods
    #[arg(short, long, default_value = "")]
    pub goods: String,

    /// Number of goods units
    #[arg(short, long)]
    pub number: u64,

    /// Total weight in tons (e.g. 12.50)
    #[arg(long)]
    pub weight: String,

    /// Photo of the plate
    #[arg(long, value_name = "FILE")]
    pub plate_image: Option<PathBuf>,

    /// Photo of the goods
    #[arg(long, value_name = "FILE")]
    pub goods_image: Option<PathBuf>,

    /// Also export the recorded row as CSV to this file
    #[arg(short, long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Interactive session arguments.
#[derive(Debug, Args)]
pub struct SessionCommand {
    /// CSV file offered for export when the session ends
    #[arg(short, long, value_name = "FILE")]
    pub export: Option<PathBuf>,
}

/// Outbox commands.
#[derive(Debug, Subcommand)]
pub enum OutboxCommand {
    /// Show how many rows are waiting
    Status {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List waiting rows, oldest first
    List {
        /// Maximum number of rows
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Send waiting rows to the remote sink
    Flush,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}
