//! Common error types for studydeck services

use thiserror::Error;

/// Common result type for studydeck operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across studydeck services
///
/// `NotFound`, `NotImplemented` and `PreconditionFailed` are expected,
/// user-facing outcomes and surface verbatim to the caller.
/// `Internal` and `Database` indicate faults; they are logged with detail
/// and surfaced generically.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found, or caller lacks a required relation
    #[error("Not found: {0}")]
    NotFound(String),

    /// Feature not implemented (e.g. an unknown merge strategy)
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Request was understood but fails a validation precondition.
    /// Carries a user-actionable message.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}
