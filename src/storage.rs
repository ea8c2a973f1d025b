//! Flat-file persistence for the key store.
//!
//! This module provides utilities for:
//! - Creating the store file on first run
//! - Reading and atomically rewriting the JSON key collection
//! - Taking timestamped backup snapshots and writing export files

use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::error::AppError;
use crate::models::key_record::KeyRecord;

/// Prefix of backup snapshot file names.
pub const BACKUP_PREFIX: &str = "keys_backup";

/// Prefix of valid-key export file names.
pub const EXPORT_PREFIX: &str = "valid_keys";

/// Create the store file with an empty collection if it does not exist yet.
///
/// Parent directories are created as needed. Returns `true` when a new file
/// was written.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created. This is the
/// one failure the binary treats as fatal at startup.
pub fn ensure_store_file(path: &Path) -> Result<bool, AppError> {
    if path.exists() {
        return Ok(false);
    }

    write_json(path, &Vec::<KeyRecord>::new())?;
    Ok(true)
}

/// Read the key collection stored at `path`.
///
/// # Returns
///
/// - `Ok(Some(records))` when the file exists and parses
/// - `Ok(None)` when the file does not exist
///
/// # Errors
///
/// - `CorruptStore`: the file exists but is not a JSON array of key records
/// - `CorruptStore`: the file exists but is not a JSON array of key records,
///   including content that is not valid UTF-8
/// - `Io`: the file exists but cannot be read
pub fn read_records(path: &Path) -> Result<Option<Vec<KeyRecord>>, AppError> {
    let contents = match fs::read(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&contents)
        .map(Some)
        .map_err(|source| AppError::CorruptStore {
            path: path.to_path_buf(),
            source,
        })
}

/// Overwrite `path` with the given records.
pub fn write_records(path: &Path, records: &[KeyRecord]) -> Result<(), AppError> {
    write_json(path, records)
}

/// Serialize `value` as pretty JSON and replace `path` with it.
///
/// The content is written to a sibling `.tmp` file first and then renamed
/// over the target, so readers never observe a half-written file.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');

    let temp = temp_path(path);
    fs::write(&temp, json)?;
    fs::rename(&temp, path)?;

    Ok(())
}

/// Copy the current store file into `backup_dir` under a timestamped name.
///
/// Returns the path of the snapshot.
pub fn backup_file(
    path: &Path,
    backup_dir: &Path,
    now: DateTime<Utc>,
) -> Result<PathBuf, AppError> {
    fs::create_dir_all(backup_dir)?;

    let target = timestamped_path(backup_dir, BACKUP_PREFIX, now);
    fs::copy(path, &target)?;

    Ok(target)
}

/// `<prefix>_<YYYYmmdd_HHMMSS>.json`, using local wall-clock time.
pub fn timestamped_name(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{}.json", stamp(prefix, now))
}

/// A path in `dir` named by [`timestamped_name`] that does not exist yet.
///
/// Names have one-second resolution, so a second file in the same second
/// gets a `_1`, `_2`, ... suffix instead of replacing the first.
pub fn timestamped_path(dir: &Path, prefix: &str, now: DateTime<Utc>) -> PathBuf {
    let stem = stamp(prefix, now);
    let mut candidate = dir.join(format!("{}.json", stem));

    let mut n = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{}_{}.json", stem, n));
        n += 1;
    }
    candidate
}

fn stamp(prefix: &str, now: DateTime<Utc>) -> String {
    let local = now.with_timezone(&Local);
    format!("{}_{}", prefix, local.format("%Y%m%d_%H%M%S"))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("keys"));
    name.push(".tmp");
    path.with_file_name(name)
}
