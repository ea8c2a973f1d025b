//! Plain-text rendering for the command surfaces.

use chrono::{DateTime, Local, Utc};

use crate::models::key_record::{KeyFilter, KeyRecord};
use crate::services::key_store::KeyStore;

const RULE_WIDTH: usize = 90;

pub fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// `dd/mm/YYYY HH:MM` in the local time zone.
pub fn local_time(instant: DateTime<Utc>) -> String {
    instant.with_timezone(&Local).format("%d/%m/%Y %H:%M").to_string()
}

/// Numbered listing of the records matching `filter`.
///
/// ```text
///   1. Q7W1ZC0P4M2N8R5T6Y3X | USED | expires 16/10/2026 12:00
///      └─ used at 15/10/2026 13:10
/// ```
pub fn listing(store: &KeyStore, filter: KeyFilter) -> String {
    let records = store.list_filtered(filter);

    let mut lines = vec![
        format!(
            "{} KEYS: {}",
            filter.label().to_ascii_uppercase(),
            records.len()
        ),
        rule(),
    ];

    for (i, record) in records.iter().enumerate() {
        lines.push(format!(
            "{:3}. {} | {} | expires {}",
            i + 1,
            record.key,
            store.status_of(record),
            local_time(record.expiry)
        ));
        if let Some(used_at) = record.used_at {
            lines.push(format!("     └─ used at {}", local_time(used_at)));
        }
    }

    lines.push(rule());
    lines.join("\n")
}

/// Full details of one record.
pub fn details(store: &KeyStore, record: &KeyRecord) -> String {
    let mut lines = vec![
        "KEY FOUND:".to_string(),
        format!("   Key: {}", record.key),
        format!("   Status: {}", store.status_of(record)),
        format!("   Generated: {}", local_time(record.generated)),
        format!("   Expires: {}", local_time(record.expiry)),
    ];
    if let Some(used_at) = record.used_at {
        lines.push(format!("   Used at: {}", local_time(used_at)));
    }
    lines.join("\n")
}

/// Counts with percentages, followed by the `recent` newest keys.
pub fn statistics(store: &KeyStore, recent: usize) -> String {
    let stats = store.statistics();

    let mut lines = vec![
        rule(),
        "KEY STATISTICS".to_string(),
        rule(),
        format!("Total keys: {:5}", stats.total),
        format!(
            "Valid:      {:5} ({:.1}%)",
            stats.valid,
            stats.share(stats.valid)
        ),
        format!("Used:       {:5} ({:.1}%)", stats.used, stats.share(stats.used)),
        format!(
            "Expired:    {:5} ({:.1}%)",
            stats.expired,
            stats.share(stats.expired)
        ),
        rule(),
    ];

    let newest = store.recent(recent);
    if !newest.is_empty() {
        lines.push(format!("LAST {} GENERATED KEYS:", newest.len()));
        for (i, record) in newest.iter().enumerate() {
            lines.push(format!(
                "{}. {} | {} | generated {}",
                i + 1,
                record.key,
                store.status_of(record),
                local_time(record.generated)
            ));
        }
    }

    lines.join("\n")
}
