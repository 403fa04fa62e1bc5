use thiserror::Error;

/// SQLSTATE raised when `lock_timeout` expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";
/// SQLSTATE raised when the server breaks a deadlock.
const DEADLOCK_DETECTED: &str = "40P01";
/// SQLSTATE raised on a unique index violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Errors that can occur when interacting with the datastore.
#[derive(Debug, Error)]
pub enum DatastoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A row lock could not be acquired in time.
    #[error("Timed out waiting for a row lock")]
    LockTimeout,

    /// A unique index rejected a write.
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A stored value could not be decoded into a domain type.
    #[error("Corrupt row: {0}")]
    Decode(String),

    /// The datastore refused the operation.
    #[error("Datastore unavailable: {0}")]
    Unavailable(String),
}

impl DatastoreError {
    /// Returns true if retrying the whole unit of work may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DatastoreError::LockTimeout | DatastoreError::Unavailable(_)
        )
    }

    /// Returns the violated constraint name, if this is a unique violation.
    pub fn violated_constraint(&self) -> Option<&str> {
        match self {
            DatastoreError::UniqueViolation { constraint } => Some(constraint),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for DatastoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            match db_err.code().as_deref() {
                Some(code @ (LOCK_NOT_AVAILABLE | DEADLOCK_DETECTED)) => {
                    tracing::debug!(code, "row lock not acquired");
                    return DatastoreError::LockTimeout;
                }
                Some(UNIQUE_VIOLATION) => {
                    let constraint = db_err.constraint().unwrap_or_default().to_string();
                    tracing::debug!(%constraint, "unique constraint violated");
                    return DatastoreError::UniqueViolation { constraint };
                }
                _ => {}
            }
        }
        DatastoreError::Database(err)
    }
}

/// Result type for datastore operations.
pub type Result<T> = std::result::Result<T, DatastoreError>;
