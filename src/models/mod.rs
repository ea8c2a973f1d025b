//! Data models for the key store.
//!
//! This module contains the persisted key record and the derived views over it.

/// Access key record and its derived status
pub mod key_record;
/// Serde helpers for the persisted timestamp formats
pub mod timestamp;
