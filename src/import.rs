use std::{fs::read_to_string, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::time::OffsetDateTime;

use crate::{
    core::{
        db::ParticipantDb,
        participant::{create_participant, NewParticipant},
        scan::{record_scan, record_scan_at},
    },
    util::deserialize_datetime,
};

fn unknown() -> String {
    "Unknown".to_string()
}

/// One hacker entry of an import file
#[derive(Deserialize, Debug, Clone)]
pub struct ImportRecord {
    #[serde(default = "unknown")]
    pub name: String,
    #[serde(default = "unknown")]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub badge_code: Option<String>,
    #[serde(default)]
    pub scans: Vec<ImportScan>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ImportScan {
    #[serde(default)]
    pub activity_name: String,
    #[serde(default)]
    pub activity_category: String,
    /// Epoch milliseconds or ISO 8601 text; the import time is used when absent
    #[serde(default, deserialize_with = "deserialize_datetime")]
    pub scanned_at: Option<OffsetDateTime>,
}

#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub participants: usize,
    pub scans: usize,
    pub skipped_participants: usize,
    pub skipped_scans: usize,
}

/// Reads the top level array of an import file. Entries are decoded one at a
/// time by [`import_records`] so a malformed entry only skips itself.
pub fn read_records(file: &Path) -> anyhow::Result<Vec<Value>> {
    let text = read_to_string(file)
        .with_context(|| format!("Failed to read import file {}", file.display()))?;

    serde_json::from_str(&text)
        .with_context(|| format!("Invalid import file {}, could not be read", file.display()))
}

/// Registers every record and its scans, skipping whatever the store rejects.
pub async fn import_records(db: &ParticipantDb, records: Vec<Value>) -> ImportSummary {
    let mut summary = ImportSummary::default();

    for (index, value) in records.into_iter().enumerate() {
        let record = match serde_json::from_value::<ImportRecord>(value) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Skipping import entry {}: {}", index, e);
                summary.skipped_participants += 1;
                continue;
            }
        };

        let new_participant = NewParticipant {
            name: record.name,
            email: record.email,
            phone: record.phone,
            badge_code: record.badge_code.unwrap_or_default(),
        };

        if let Err(e) = create_participant(db, &new_participant).await {
            log::warn!(
                "Skipping hacker {} <{}> with badge code '{}': {}",
                new_participant.name,
                new_participant.email,
                new_participant.badge_code,
                e
            );
            summary.skipped_participants += 1;
            continue;
        }
        summary.participants += 1;

        let badge_code = &new_participant.badge_code;
        for scan in record.scans {
            let result = match scan.scanned_at {
                Some(at) => {
                    record_scan_at(db, badge_code, &scan.activity_name, &scan.activity_category, at)
                        .await
                }
                None => {
                    record_scan(db, badge_code, &scan.activity_name, &scan.activity_category)
                        .await
                }
            };

            match result {
                Ok(_) => summary.scans += 1,
                Err(e) => {
                    log::warn!(
                        "Skipping scan of {} into '{}': {}",
                        badge_code,
                        scan.activity_name,
                        e
                    );
                    summary.skipped_scans += 1;
                }
            }
        }
    }

    summary
}

pub async fn import_file(db: &ParticipantDb, file: &Path) -> anyhow::Result<ImportSummary> {
    let records = read_records(file)?;
    log::info!("Importing {} hackers from {}", records.len(), file.display());
    Ok(import_records(db, records).await)
}
