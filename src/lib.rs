//! Key Manager - time-limited access keys in a flat JSON file.
//!
//! Keys are generated with a lifetime, redeemed at most once, and removed
//! once they expire unused. Used keys are kept for history.
//!
//! # Layout
//!
//! - [`models`]: the persisted key record and its derived states
//! - [`services`]: the key store, its clock and the publish collaborator
//! - [`storage`]: flat-file reads, atomic writes, backups and exports
//! - [`handlers`]: the interactive menu and command execution
//! - [`config`]: environment-driven configuration

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod storage;
