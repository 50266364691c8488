use sqlx::error::ErrorKind;
use thiserror::Error;

/// Failures surfaced by the participant store and the operations built on it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No hacker with badge code '{0}'")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A uniqueness or foreign-key rule was broken, including a repeated scan.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => {
                    return StoreError::ConstraintViolation(db_err.message().to_owned())
                }
                _ => {}
            }
        }

        StoreError::Database(err)
    }
}
