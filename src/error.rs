//! Error types for the wiki database service.
//!
//! `WikiDbError` is what the catalog, pool and repository return. At the
//! message boundary every variant except `Configuration` is reduced to the
//! `DbError` wire code, see [`ErrorCode`].

use derive_more::Display;
use thiserror::Error;

pub type Result<T, E = WikiDbError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum WikiDbError {
    /// Startup-fatal: query resource, query key or driver problems.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Pool could not be opened or a connection could not be acquired.
    #[error("Connection error: {0}")]
    Connection(#[source] sqlx::Error),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// The request payload could not be mapped onto statement parameters.
    #[error("Invalid parameter: {0}")]
    Parameter(String),
}

impl WikiDbError {
    /// The underlying cause text, without our own prefix. This is what callers
    /// receive in a failed reply.
    pub fn cause_message(&self) -> String {
        match self {
            WikiDbError::Configuration(msg) | WikiDbError::Parameter(msg) => msg.clone(),
            WikiDbError::Connection(e) | WikiDbError::Database(e) => e.to_string(),
        }
    }
}

/// Failure codes carried by failed replies. The numeric values are part of the
/// wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorCode {
    #[display("NO_ACTION_SPECIFIED")]
    NoActionSpecified = 0,
    #[display("BAD_ACTION")]
    BadAction = 1,
    #[display("DB_ERROR")]
    DbError = 2,
}

impl ErrorCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ErrorCode::NoActionSpecified),
            1 => Some(ErrorCode::BadAction),
            2 => Some(ErrorCode::DbError),
            _ => None,
        }
    }
}
