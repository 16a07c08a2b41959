//! Error types for the DB-API layer.
//!
//! Variants follow the DB-API 2.0 exception hierarchy. Everything except
//! `Warning` is an `Error`; the `Data`..`NotSupported` group are
//! `DatabaseError`s.

use thiserror::Error;

use crate::sqlite::SqliteError;

#[derive(Error, Debug)]
pub enum DbApiError {
    #[error("Warning: {0}")]
    Warning(String),

    #[error("Interface error: {0}")]
    InterfaceError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Operational error: {0}")]
    OperationalError(String),

    #[error("Integrity error: {0}")]
    IntegrityError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Programming error: {0}")]
    ProgrammingError(String),

    #[error("Not supported: {0}")]
    NotSupportedError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DbApiError {
    pub fn programming(msg: impl Into<String>) -> Self {
        DbApiError::ProgrammingError(msg.into())
    }

    pub fn interface(msg: impl Into<String>) -> Self {
        DbApiError::InterfaceError(msg.into())
    }

    /// True for the `DatabaseError` branch of the hierarchy.
    pub fn is_database_error(&self) -> bool {
        matches!(
            self,
            DbApiError::DatabaseError(_)
                | DbApiError::DataError(_)
                | DbApiError::OperationalError(_)
                | DbApiError::IntegrityError(_)
                | DbApiError::InternalError(_)
                | DbApiError::ProgrammingError(_)
                | DbApiError::NotSupportedError(_)
        )
    }
}

impl From<SqliteError> for DbApiError {
    fn from(err: SqliteError) -> Self {
        use rusqlite::ErrorCode;

        match err {
            SqliteError::Io(e) => DbApiError::IoError(e),
            SqliteError::ConnectionClosed => {
                DbApiError::programming("Can not execute on closed connection")
            }
            SqliteError::Type(msg) => DbApiError::DataError(msg),
            SqliteError::Worker(msg) => DbApiError::OperationalError(msg),
            SqliteError::Sqlite(e) => {
                let msg = e.to_string();
                let code = match &e {
                    // Prepare-time failures carry their code outside SqliteFailure
                    rusqlite::Error::SqlInputError { error, .. } => Some(error.code),
                    other => other.sqlite_error_code(),
                };
                match code {
                    Some(ErrorCode::ConstraintViolation) => DbApiError::IntegrityError(msg),
                    Some(ErrorCode::TypeMismatch) | Some(ErrorCode::TooBig) => {
                        DbApiError::DataError(msg)
                    }
                    Some(ErrorCode::DatabaseBusy)
                    | Some(ErrorCode::DatabaseLocked)
                    | Some(ErrorCode::CannotOpen)
                    | Some(ErrorCode::DiskFull)
                    | Some(ErrorCode::ReadOnly) => DbApiError::OperationalError(msg),
                    Some(ErrorCode::InternalMalfunction) => DbApiError::InternalError(msg),
                    // Syntax errors and unknown tables surface as SQLITE_ERROR
                    Some(ErrorCode::Unknown) => DbApiError::ProgrammingError(msg),
                    _ => DbApiError::DatabaseError(msg),
                }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, DbApiError>;
