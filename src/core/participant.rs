use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::time::OffsetDateTime};

use crate::{error::StoreError, util::serialize_datetime};

use super::{
    db::{ParticipantDb, ParticipantField},
    scan::Scan,
};

/// A registered hacker and the activities they have checked into.
#[derive(PartialEq, Eq, Debug, FromRow, Clone, Serialize)]
pub struct Participant {
    pub name: String,

    /// Trimmed, lower-cased, unique across all hackers
    pub email: String,

    pub phone: Option<String>,

    /// Immutable identity key
    pub badge_code: String,

    /// Refreshed on every change to this hacker or its scans
    #[serde(serialize_with = "serialize_datetime")]
    pub updated_at: OffsetDateTime,

    #[sqlx(skip)]
    pub scans: Vec<Scan>,
}

/// Registration payload for a single hacker
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct NewParticipant {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub badge_code: String,
}

/// A sparse update. `None` leaves the field unchanged.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct ParticipantUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl ParticipantUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none() && self.email.is_none()
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn list_participants(db: &ParticipantDb) -> Result<Vec<Participant>, StoreError> {
    db.list_participants().await
}

pub async fn get_participant(db: &ParticipantDb, badge_code: &str) -> Result<Participant, StoreError> {
    db.get_participant(badge_code)
        .await?
        .ok_or_else(|| StoreError::NotFound(badge_code.to_owned()))
}

pub async fn create_participant(
    db: &ParticipantDb,
    participant: &NewParticipant,
) -> Result<Participant, StoreError> {
    let participant = NewParticipant {
        email: normalize_email(&participant.email),
        ..participant.clone()
    };

    if participant.name.is_empty() {
        return Err(StoreError::InvalidInput("name is empty".to_string()));
    }
    if participant.email.is_empty() {
        return Err(StoreError::InvalidInput("email is empty".to_string()));
    }
    if participant.badge_code.is_empty() {
        return Err(StoreError::InvalidInput("badge code is empty".to_string()));
    }

    let mut tx = db.begin().await?;
    tx.insert_participant(&participant).await?;
    let created = tx.commit_and_fetch(&participant.badge_code).await?;

    log::info!("Registered hacker {} ({})", created.name, created.badge_code);
    Ok(created)
}

/// Deletes a hacker and all of its scans. Deleting an unknown badge code is not an error.
pub async fn delete_participant(db: &ParticipantDb, badge_code: &str) -> Result<(), StoreError> {
    let mut tx = db.begin().await?;
    let deleted = tx.delete_participant(badge_code).await?;
    tx.commit().await?;

    if deleted {
        log::info!("Removed hacker {}", badge_code);
    } else {
        log::warn!("Asked to remove hacker {}, but no such hacker exists", badge_code);
    }
    Ok(())
}

/// Merges a sparse update into an existing hacker.
///
/// `name` and `phone` are written as given, including empty strings. `email`
/// is normalized first; an email that normalizes to nothing, or that belongs to
/// another hacker, is skipped with a warning instead of failing the update.
/// The timestamp only moves when at least one field was written, and the
/// returned record is the hacker as it stands after the update.
pub async fn update_participant(
    db: &ParticipantDb,
    badge_code: &str,
    update: &ParticipantUpdate,
) -> Result<Participant, StoreError> {
    let mut tx = db.begin().await?;

    if !tx.exists(badge_code).await? {
        return Err(StoreError::NotFound(badge_code.to_owned()));
    }

    if update.is_empty() {
        log::info!("No changes requested for hacker {}", badge_code);
        return tx.commit_and_fetch(badge_code).await;
    }

    if let Some(name) = &update.name {
        tx.set_field(badge_code, ParticipantField::Name, name).await?;
    }

    if let Some(phone) = &update.phone {
        tx.set_field(badge_code, ParticipantField::Phone, phone).await?;
    }

    if let Some(email) = &update.email {
        let email = normalize_email(email);

        if email.is_empty() {
            log::warn!("Email for hacker {} not changed, given email was empty", badge_code);
        } else {
            match tx.email_owner(&email).await? {
                Some(owner) if owner != badge_code => log::warn!(
                    "Email for hacker {} not changed, {} is already used by {}",
                    badge_code,
                    email,
                    owner
                ),
                _ => tx.set_field(badge_code, ParticipantField::Email, &email).await?,
            }
        }
    }

    let updated = tx.commit_and_fetch(badge_code).await?;
    log::debug!("Updated hacker {}", badge_code);
    Ok(updated)
}
