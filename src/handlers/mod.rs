//! Command handlers for the interactive menu and the one-shot CLI.
//!
//! Each handler:
//! 1. Receives a parsed [`Command`]
//! 2. Runs the matching key store operation
//! 3. Publishes the change when the store was mutated
//! 4. Returns the text to show the user

/// Interactive numbered menu
pub mod menu;
/// Text rendering of records, listings and statistics
pub mod render;

use crate::error::AppError;
use crate::models::key_record::KeyFilter;
use crate::services::key_store::KeyStore;
use crate::services::publish::{self, Publisher};

/// Number of records shown under "most recent" on the statistics screen.
pub const RECENT_LIMIT: usize = 5;

/// One user-facing operation. Both command surfaces map onto this 1:1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Generate one key; `None` uses the configured default duration.
    Generate { hours: Option<u32> },
    GenerateBatch { count: u32, hours: Option<u32> },
    List(KeyFilter),
    Find(String),
    MarkUsed(String),
    CleanExpired,
    Statistics,
    ExportValid,
    Reload,
    Validate(String),
}

/// Normalize user-typed key input: trimmed and upper-cased.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Run `command` against the store.
///
/// # Errors
///
/// Lookup, lifecycle, input and storage errors from the store are returned
/// unchanged. Publish failures are not errors: they are appended to the
/// output and logged.
pub fn execute(
    store: &mut KeyStore,
    publisher: &dyn Publisher,
    command: Command,
) -> Result<String, AppError> {
    match command {
        Command::Generate { hours } => {
            let hours = hours.unwrap_or(store.default_duration_hours());
            let record = store.generate(hours)?;

            let mut out = format!(
                "Key generated: {}\n   Expires: {}",
                record.key,
                render::local_time(record.expiry)
            );
            publish_change(publisher, &publish::generated_message(1), &mut out);
            Ok(out)
        }
        Command::GenerateBatch { count, hours } => {
            let hours = hours.unwrap_or(store.default_duration_hours());
            let batch = store.generate_batch(count, hours)?;

            let mut out = format!("Generated {} key(s):", batch.len());
            for (i, record) in batch.iter().enumerate() {
                out.push_str(&format!("\n   {}/{} - {}", i + 1, batch.len(), record.key));
            }
            publish_change(publisher, &publish::generated_message(batch.len()), &mut out);
            Ok(out)
        }
        Command::List(filter) => Ok(render::listing(store, filter)),
        Command::Find(key) => match store.find_by_key(&key) {
            Some(record) => Ok(render::details(store, record)),
            None => Err(AppError::NotFound(key)),
        },
        Command::MarkUsed(key) => {
            let record = store.mark_used(&key)?;

            let mut out = format!("Key {} marked as used", record.key);
            publish_change(publisher, &publish::used_message(&record.key), &mut out);
            Ok(out)
        }
        Command::CleanExpired => {
            let removed = store.clean_expired()?;

            let mut out = format!("{} expired key(s) removed", removed);
            if removed > 0 {
                publish_change(publisher, &publish::cleaned_message(removed), &mut out);
            }
            Ok(out)
        }
        Command::Statistics => Ok(render::statistics(store, RECENT_LIMIT)),
        Command::ExportValid => {
            let path = store.export_valid()?;
            let valid = store.statistics().valid;
            Ok(format!(
                "{} valid key(s) exported to {}",
                valid,
                path.display()
            ))
        }
        Command::Reload => match store.load() {
            Ok(count) => Ok(format!("Reloaded {} key(s) from file", count)),
            Err(e @ AppError::CorruptStore { .. }) => {
                tracing::warn!("{}; continuing with an empty store", e);
                Ok(format!("{}\nContinuing with an empty store", e))
            }
            Err(e) => Err(e),
        },
        Command::Validate(key) => {
            let validation = store.validate(&key);
            let verdict = if validation.is_valid() { "OK" } else { "REJECTED" };
            Ok(format!("{}: key {} is {}", verdict, key, validation.reason()))
        }
    }
}

/// Publish after a successful mutation, reporting failure in `out`.
fn publish_change(publisher: &dyn Publisher, change: &str, out: &mut String) {
    if let Err(e) = publisher.publish(change) {
        tracing::warn!("{}", e);
        out.push_str(&format!(
            "\n{}\nThe key file was saved locally; publish it manually.",
            e
        ));
    }
}
