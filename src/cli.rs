//! One-shot command line.
//!
//! `key-manager <COMMAND>` runs a single operation and exits. Without a
//! command the interactive menu starts.

use clap::{Parser, Subcommand};

use crate::handlers::{Command, normalize_key};
use crate::models::key_record::KeyFilter;

#[derive(Debug, Parser)]
#[command(name = "key-manager")]
#[command(about = "Generate, redeem and expire time-limited access keys", long_about = None)]
pub struct Cli {
    /// Commit and push the key file after changes, regardless of AUTO_PUBLISH
    #[arg(long, global = true)]
    pub publish: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Generate one key
    Generate {
        /// Lifetime in hours (default: DEFAULT_DURATION_HOURS)
        #[arg(long)]
        hours: Option<u32>,
    },

    /// Generate several keys at once
    Batch {
        /// Number of keys
        #[arg(long, default_value_t = 10)]
        count: u32,

        /// Lifetime in hours (default: DEFAULT_DURATION_HOURS)
        #[arg(long)]
        hours: Option<u32>,
    },

    /// List keys: all, valid, used or expired
    List {
        #[arg(default_value = "all")]
        filter: KeyFilter,
    },

    /// Show one key
    Find { key: String },

    /// Mark a key as used
    Use { key: String },

    /// Check whether a key can be used
    Validate { key: String },

    /// Remove expired, unused keys
    Clean,

    /// Show statistics
    Stats,

    /// Export valid keys to a timestamped file
    Export,
}

impl From<CliCommand> for Command {
    fn from(command: CliCommand) -> Self {
        match command {
            CliCommand::Generate { hours } => Command::Generate { hours },
            CliCommand::Batch { count, hours } => Command::GenerateBatch { count, hours },
            CliCommand::List { filter } => Command::List(filter),
            CliCommand::Find { key } => Command::Find(normalize_key(&key)),
            CliCommand::Use { key } => Command::MarkUsed(normalize_key(&key)),
            CliCommand::Validate { key } => Command::Validate(normalize_key(&key)),
            CliCommand::Clean => Command::CleanExpired,
            CliCommand::Stats => Command::Statistics,
            CliCommand::Export => Command::ExportValid,
        }
    }
}
