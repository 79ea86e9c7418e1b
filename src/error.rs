//! Error types for the lending core

use serde::Serialize;
use thiserror::Error;

/// Error kinds surfaced to callers, with stable numeric codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum ErrorKind {
    InvalidArgument = 1,
    NotFound = 2,
    InvalidTransition = 3,
    InvalidState = 4,
    AlreadyResolved = 5,
    StoreFailure = 6,
}

impl ErrorKind {
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Already resolved: {0}")]
    AlreadyResolved(String),

    #[error("Store failure while {context}: {source}")]
    StoreFailure {
        context: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    /// Wrap a collaborator error with the operation that was running
    pub fn store(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        let context = context.into();
        let source = source.into();
        tracing::error!("Store failure while {}: {:?}", context, source);
        AppError::StoreFailure { context, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::InvalidTransition(_) => ErrorKind::InvalidTransition,
            AppError::InvalidState(_) => ErrorKind::InvalidState,
            AppError::AlreadyResolved(_) => ErrorKind::AlreadyResolved,
            AppError::StoreFailure { .. } => ErrorKind::StoreFailure,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::store("running a database query", e)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::InvalidArgument(e.to_string())
    }
}

/// Adds operation context to raw database results
pub trait StoreResultExt<T> {
    fn store_context(self, context: &str) -> AppResult<T>;
}

impl<T> StoreResultExt<T> for Result<T, sqlx::Error> {
    fn store_context(self, context: &str) -> AppResult<T> {
        self.map_err(|e| AppError::store(context, e))
    }
}

/// Error response body handed to the presentation layer
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: ErrorKind,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(e: &AppError) -> Self {
        let kind = e.kind();
        Self {
            code: kind.code(),
            error: kind,
            message: e.to_string(),
        }
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
