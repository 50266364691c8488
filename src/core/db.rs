use std::{collections::BTreeSet, collections::HashMap, path::Path, str::FromStr};

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    types::time::OffsetDateTime,
    Sqlite, SqliteConnection, SqlitePool, Transaction,
};

use crate::error::StoreError;

use super::{
    frequency::{ActivityFrequency, FrequencyQuery},
    participant::{NewParticipant, Participant},
    scan::Scan,
};

type Result<T> = std::result::Result<T, StoreError>;

const SCHEMA: [&str; 2] = [
    "create table if not exists participants(
                name text not null,
                email text unique not null collate nocase,
                phone text,
                badge_code text primary key not null,
                updated_at text not null
            );",
    "create table if not exists scans(
                badge_code text not null,
                activity_name text not null,
                activity_category text not null,
                scanned_at text not null,
                primary key(badge_code, activity_name),
                foreign key(badge_code) references participants(badge_code) on delete cascade
            );",
];

/// Participant fields that may be written after registration.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum ParticipantField {
    Name,
    Phone,
    Email,
}

impl ParticipantField {
    fn column(self) -> &'static str {
        match self {
            ParticipantField::Name => "name",
            ParticipantField::Phone => "phone",
            ParticipantField::Email => "email",
        }
    }
}

pub struct ParticipantDb {
    db: SqlitePool,
}

impl ParticipantDb {
    /// Opens the database at `file`, creating the file and schema when missing.
    pub async fn init(file: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(file)
            .create_if_missing(true)
            .foreign_keys(true);

        Self::connect(options).await
    }

    /// Opens a private in-memory database.
    pub async fn memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        Self::connect(options).await
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self> {
        // A single connection serializes writers and keeps an in-memory database alive.
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&db).await?;
        }

        Ok(ParticipantDb { db })
    }

    /// Starts a unit of work. Dropping it without [`StoreTx::commit`] rolls back.
    pub async fn begin(&self) -> Result<StoreTx> {
        Ok(StoreTx {
            tx: self.db.begin().await?,
            touched: BTreeSet::new(),
        })
    }

    pub async fn get_participant(&self, badge_code: &str) -> Result<Option<Participant>> {
        let mut conn = self.db.acquire().await?;
        fetch_participant(&mut conn, badge_code).await
    }

    pub async fn list_participants(&self) -> Result<Vec<Participant>> {
        let mut participants: Vec<Participant> =
            sqlx::query_as("select * from participants order by rowid")
                .fetch_all(&self.db)
                .await?;

        let scans: Vec<Scan> = sqlx::query_as("select * from scans order by rowid")
            .fetch_all(&self.db)
            .await?;

        let mut scans_by_badge: HashMap<String, Vec<Scan>> = HashMap::new();
        for scan in scans {
            scans_by_badge
                .entry(scan.badge_code.clone())
                .or_default()
                .push(scan);
        }

        for participant in participants.iter_mut() {
            participant.scans = scans_by_badge
                .remove(&participant.badge_code)
                .unwrap_or_default();
        }

        Ok(participants)
    }

    pub async fn list_scans(&self, badge_code: &str) -> Result<Vec<Scan>> {
        let mut conn = self.db.acquire().await?;
        fetch_scans(&mut conn, badge_code).await
    }

    /// Runs an aggregation over the scans table.
    pub async fn scan_frequencies(&self, query: &FrequencyQuery) -> Result<Vec<ActivityFrequency>> {
        let mut builder = query.build();
        log::debug!("Running frequency query: {}", builder.sql());

        Ok(builder
            .build_query_as::<ActivityFrequency>()
            .fetch_all(&self.db)
            .await?)
    }
}

async fn fetch_participant(
    conn: &mut SqliteConnection,
    badge_code: &str,
) -> Result<Option<Participant>> {
    let participant: Option<Participant> =
        sqlx::query_as("select * from participants where badge_code = ? limit 1")
            .bind(badge_code)
            .fetch_optional(&mut *conn)
            .await?;

    match participant {
        Some(mut participant) => {
            participant.scans = fetch_scans(conn, badge_code).await?;
            Ok(Some(participant))
        }
        None => Ok(None),
    }
}

async fn fetch_scans(conn: &mut SqliteConnection, badge_code: &str) -> Result<Vec<Scan>> {
    Ok(
        sqlx::query_as("select * from scans where badge_code = ? order by rowid")
            .bind(badge_code)
            .fetch_all(&mut *conn)
            .await?,
    )
}

/// A scoped unit of work over the store.
///
/// Every write records the badge code it touched. On commit, the post-write
/// hook sets `updated_at` for each touched participant before the transaction
/// is committed, so no caller refreshes timestamps itself.
pub struct StoreTx {
    tx: Transaction<'static, Sqlite>,
    touched: BTreeSet<String>,
}

impl StoreTx {
    pub async fn participant(&mut self, badge_code: &str) -> Result<Option<Participant>> {
        fetch_participant(&mut self.tx, badge_code).await
    }

    pub async fn exists(&mut self, badge_code: &str) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("select count(*) from participants where badge_code = ?")
                .bind(badge_code)
                .fetch_one(&mut *self.tx)
                .await?;

        Ok(count > 0)
    }

    /// Badge code of the participant registered under `email`, if any.
    pub async fn email_owner(&mut self, email: &str) -> Result<Option<String>> {
        Ok(
            sqlx::query_scalar("select badge_code from participants where email = ? limit 1")
                .bind(email)
                .fetch_optional(&mut *self.tx)
                .await?,
        )
    }

    pub async fn insert_participant(&mut self, participant: &NewParticipant) -> Result<()> {
        log::debug!("Creating hacker {}", participant.badge_code);
        sqlx::query(
            "insert into participants(name, email, phone, badge_code, updated_at)
                        values(?, ?, ?, ?, ?)",
        )
        .bind(&participant.name)
        .bind(&participant.email)
        .bind(&participant.phone)
        .bind(&participant.badge_code)
        .bind(OffsetDateTime::now_utc())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    pub async fn set_field(
        &mut self,
        badge_code: &str,
        field: ParticipantField,
        value: &str,
    ) -> Result<()> {
        sqlx::query(&format!(
            "update participants set {} = ? where badge_code = ?",
            field.column()
        ))
        .bind(value)
        .bind(badge_code)
        .execute(&mut *self.tx)
        .await?;

        self.touch(badge_code);
        Ok(())
    }

    pub async fn insert_scan(
        &mut self,
        badge_code: &str,
        activity_name: &str,
        activity_category: &str,
        scanned_at: OffsetDateTime,
    ) -> Result<()> {
        sqlx::query(
            "insert into scans(badge_code, activity_name, activity_category, scanned_at)
                        values(?, ?, ?, ?)",
        )
        .bind(badge_code)
        .bind(activity_name)
        .bind(activity_category)
        .bind(scanned_at)
        .execute(&mut *self.tx)
        .await?;

        self.touch(badge_code);
        Ok(())
    }

    /// Deletes a participant and, by cascade, its scans.
    ///
    /// The timestamp is refreshed first so the final state of the row carries
    /// the deletion time. Returns whether a row was removed.
    pub async fn delete_participant(&mut self, badge_code: &str) -> Result<bool> {
        self.refresh(badge_code, OffsetDateTime::now_utc()).await?;
        self.touched.remove(badge_code);

        let result = sqlx::query("delete from participants where badge_code = ?")
            .bind(badge_code)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Marks a participant as modified for the commit hook.
    pub fn touch(&mut self, badge_code: &str) {
        self.touched.insert(badge_code.to_owned());
    }

    async fn refresh(&mut self, badge_code: &str, now: OffsetDateTime) -> Result<()> {
        sqlx::query("update participants set updated_at = ? where badge_code = ?")
            .bind(now)
            .bind(badge_code)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn run_touch_hook(&mut self) -> Result<()> {
        let now = OffsetDateTime::now_utc();
        for badge_code in std::mem::take(&mut self.touched) {
            self.refresh(&badge_code, now).await?;
        }

        Ok(())
    }

    pub async fn commit(mut self) -> Result<()> {
        self.run_touch_hook().await?;
        self.tx.commit().await?;
        Ok(())
    }

    /// Commits and returns the participant's state as of the commit.
    pub async fn commit_and_fetch(mut self, badge_code: &str) -> Result<Participant> {
        self.run_touch_hook().await?;
        let participant = self
            .participant(badge_code)
            .await?
            .ok_or_else(|| StoreError::NotFound(badge_code.to_owned()))?;

        self.tx.commit().await?;
        Ok(participant)
    }
}
