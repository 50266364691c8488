use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::time::OffsetDateTime};

use crate::{error::StoreError, util::serialize_datetime};

use super::{db::ParticipantDb, participant::Participant};

/// A check-in of one hacker into one named activity
#[derive(PartialEq, Eq, Debug, FromRow, Clone, Serialize)]
pub struct Scan {
    #[serde(skip)]
    pub badge_code: String,

    pub activity_name: String,

    pub activity_category: String,

    #[serde(serialize_with = "serialize_datetime")]
    pub scanned_at: OffsetDateTime,
}

/// Json body of a scan request
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct ScanRequest {
    #[serde(default)]
    pub activity_name: String,
    #[serde(default)]
    pub activity_category: String,
}

pub async fn record_scan(
    db: &ParticipantDb,
    badge_code: &str,
    activity_name: &str,
    activity_category: &str,
) -> Result<Participant, StoreError> {
    record_scan_at(
        db,
        badge_code,
        activity_name,
        activity_category,
        OffsetDateTime::now_utc(),
    )
    .await
}

/// Records a scan with an explicit check-in time.
///
/// A hacker can check into a given activity once; a repeat is a
/// [`StoreError::ConstraintViolation`] and leaves the existing scan untouched.
pub async fn record_scan_at(
    db: &ParticipantDb,
    badge_code: &str,
    activity_name: &str,
    activity_category: &str,
    scanned_at: OffsetDateTime,
) -> Result<Participant, StoreError> {
    if activity_name.is_empty() || activity_category.is_empty() {
        return Err(StoreError::InvalidInput(
            "no name or category was given for the activity".to_string(),
        ));
    }

    let mut tx = db.begin().await?;
    if !tx.exists(badge_code).await? {
        return Err(StoreError::NotFound(badge_code.to_owned()));
    }

    tx.insert_scan(badge_code, activity_name, activity_category, scanned_at)
        .await
        .map_err(|e| {
            log::warn!(
                "Failed to record scan of {} into {}: {}",
                badge_code,
                activity_name,
                e
            );
            e
        })?;

    let participant = tx.commit_and_fetch(badge_code).await?;
    log::info!("Scan of {} into {} recorded", badge_code, activity_name);
    Ok(participant)
}
