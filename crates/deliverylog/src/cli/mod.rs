//! Command-line interface for deliverylog.
//!
//! This module provides the CLI structure for the `dlog` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{
    ConfigCommand, OutboxCommand, OutputFormat, RecordCommand, SessionCommand, StatusCommand,
};

/// dlog - Log incoming deliveries
///
/// Records who delivered what, stores the plate and goods photos in a
/// per-delivery folder, exports the session as CSV and mirrors every row to
/// a remote spreadsheet.
#[derive(Debug, Parser)]
#[command(name = "dlog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record one delivery
    Record(RecordCommand),

    /// Record deliveries interactively
    Session(SessionCommand),

    /// Inspect or flush rows waiting for the remote sink
    #[command(subcommand)]
    Outbox(OutboxCommand),

    /// Show storage and sync status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
