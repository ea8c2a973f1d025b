//! Access key model and its lifecycle rules.
//!
//! A key is created valid, and leaves that state either by being used or by
//! passing its expiry unused. Only the `used` flag is stored; validity and
//! expiration are always derived from the evaluation instant.
//!
//! ```text
//!            mark_used
//!   Valid ───────────────▶ Used   (kept forever)
//!     │
//!     │ expiry <= now
//!     ▼
//!   Expired ──clean──▶ (removed)
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::timestamp;

/// Length of a generated key string.
pub const KEY_LENGTH: usize = 20;

/// Alphabet keys are sampled from: uppercase ASCII letters and digits.
const KEY_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A single time-limited access key as persisted in the store file.
///
/// # Persisted Fields
///
/// - `key`: the token string handed out to users
/// - `generated`: ISO-8601 creation instant
/// - `expiry`: Unix seconds after which the key can no longer be used
/// - `used`: whether the key was redeemed
/// - `usedAt`: ISO-8601 redemption instant, `null` while unused
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecord {
    pub key: String,

    #[serde(deserialize_with = "timestamp::lenient::deserialize")]
    pub generated: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_seconds")]
    pub expiry: DateTime<Utc>,

    pub used: bool,

    /// Set if and only if `used` is true.
    #[serde(default, deserialize_with = "timestamp::lenient_option::deserialize")]
    pub used_at: Option<DateTime<Utc>>,
}

impl KeyRecord {
    /// Issue a fresh, unused key at `now` that lives for `lifetime`.
    ///
    /// `lifetime` must be positive; the store validates durations before
    /// calling this. Returns `None` if the expiry is out of range.
    pub fn issue(now: DateTime<Utc>, lifetime: TimeDelta) -> Option<Self> {
        let expiry = now.checked_add_signed(lifetime)?;

        Some(Self {
            key: generate_key(),
            generated: now,
            expiry,
            used: false,
            used_at: None,
        })
    }

    /// `!used && expiry > now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.used && self.expiry > now
    }

    /// `!used && expiry <= now`. Used keys never count as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        !self.used && self.expiry <= now
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> KeyStatus {
        if self.used {
            KeyStatus::Used
        } else if self.expiry <= now {
            KeyStatus::Expired
        } else {
            KeyStatus::Valid
        }
    }

    /// Redeem the key.
    ///
    /// # Errors
    ///
    /// `AlreadyUsed` if the key was redeemed before. The first `used_at`
    /// is left untouched.
    pub fn mark_used(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.used {
            return Err(AppError::AlreadyUsed(self.key.clone()));
        }

        self.used = true;
        self.used_at = Some(now);
        Ok(())
    }
}

/// Sample a key string uniformly from [`KEY_ALPHABET`].
pub fn generate_key() -> String {
    let mut rng = rand::rng();
    (0..KEY_LENGTH)
        .map(|_| KEY_ALPHABET[rng.random_range(0..KEY_ALPHABET.len())] as char)
        .collect()
}

/// Derived state of a key at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Valid,
    Used,
    Expired,
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            KeyStatus::Valid => "VALID",
            KeyStatus::Used => "USED",
            KeyStatus::Expired => "EXPIRED",
        };
        f.write_str(label)
    }
}

/// Which records a listing should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyFilter {
    #[default]
    All,
    Valid,
    Used,
    Expired,
}

impl KeyFilter {
    pub fn matches(&self, record: &KeyRecord, now: DateTime<Utc>) -> bool {
        match self {
            KeyFilter::All => true,
            KeyFilter::Valid => record.is_valid_at(now),
            KeyFilter::Used => record.used,
            KeyFilter::Expired => record.is_expired_at(now),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            KeyFilter::All => "all",
            KeyFilter::Valid => "valid",
            KeyFilter::Used => "used",
            KeyFilter::Expired => "expired",
        }
    }
}

impl FromStr for KeyFilter {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(KeyFilter::All),
            "valid" => Ok(KeyFilter::Valid),
            "used" => Ok(KeyFilter::Used),
            "expired" => Ok(KeyFilter::Expired),
            other => Err(AppError::InvalidInput(format!(
                "unknown filter '{other}' (expected all, valid, used or expired)"
            ))),
        }
    }
}

/// Outcome of validating a key string. The rejections are checked in
/// declaration order; a key that passes all of them is `Valid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    NotFound,
    AlreadyUsed,
    Expired,
    Valid,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Validation::Valid => "valid",
            Validation::NotFound => "not found",
            Validation::AlreadyUsed => "already used",
            Validation::Expired => "expired",
        }
    }
}

/// Counts per derived state. The three buckets are disjoint and sum to `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyStatistics {
    pub total: usize,
    pub valid: usize,
    pub used: usize,
    pub expired: usize,
}

impl KeyStatistics {
    /// Percentage of `count` over `total`, 0.0 for an empty store.
    pub fn share(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 / self.total as f64 * 100.0
        }
    }
}
