//! Key Manager - Main Application Entry Point
//!
//! Command-line tool for managing time-limited access keys stored in a JSON file. Keys can be generated, redeemed, validated, listed, exported and cleaned up once expired.
//!
//! # Architecture
//!
//! - **Store**: a single JSON array rewritten on every change
//! - **Surfaces**: interactive numbered menu, or one-shot subcommands (clap)
//! - **Publishing**: optional git commit and push after each change
//!
//! # Startup Flow
//!
//! 1. Initialize logging
//! 2. Load configuration from environment variables
//! 3. Open the key store (creating the file if needed)
//! 4. Run one command, or the interactive menu

use std::io;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use key_manager::cli::Cli;
use key_manager::config::Config;
use key_manager::handlers::{self, menu::Menu};
use key_manager::services::key_store::KeyStore;
use key_manager::services::publish::{GitPublisher, NoopPublisher, Publisher};

fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level).
    // Logs go to stderr so they stay out of the menu output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Failing to create the store file is the only fatal store error
    let mut store = KeyStore::open(config.store_config()?)?;

    let publisher: Box<dyn Publisher> = if cli.publish || config.auto_publish {
        tracing::info!("Publishing to git repository at {}", config.repo_dir.display());
        Box::new(GitPublisher::new(&config.repo_dir, &config.keys_file))
    } else {
        Box::new(NoopPublisher)
    };

    match cli.command {
        Some(command) => match handlers::execute(&mut store, publisher.as_ref(), command.into()) {
            Ok(output) => println!("{}", output),
            Err(e) => {
                eprintln!("Error [{}]: {}", e.code(), e);
                process::exit(1);
            }
        },
        None => {
            let mut menu = Menu::new(io::stdin().lock(), io::stdout().lock());
            menu.run(&mut store, publisher.as_ref())?;
        }
    }

    Ok(())
}
