//! Error type definitions for the jukebox scheduler.
//!
//! This module defines all error types used throughout the application,
//! providing a hierarchical error system that makes debugging and error
//! handling more straightforward.

use thiserror::Error;

/// Top-level application error type.
///
/// This enum represents all possible errors that can occur in the
/// application. It uses `thiserror` to provide automatic error trait
/// implementations and proper error chaining.
#[derive(Error, Debug)]
pub enum AppError {
    /// Scheduler-layer errors (the §7 taxonomy).
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Repository / persistence errors.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Web layer errors.
    #[error("Web error: {0}")]
    Web(#[from] WebError),

    /// Configuration errors.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Errors surfaced by [`crate::scheduler::Scheduler`] operations.
///
/// This is exactly the taxonomy in the specification: every variant is
/// recoverable at the caller boundary and the scheduler never retries them.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Neither or both of `song_id`/`video_url` were supplied to `vote`.
    #[error("exactly one of song_id or video_url must be specified")]
    InvalidArgument,

    /// The submitted `video_url`'s host is not a recognized remote provider.
    #[error("unsupported remote source: {url}")]
    UnsupportedSource { url: String },

    /// The remote metadata fetcher failed to resolve a `video_url`.
    #[error("failed to look up remote video metadata for {url}: {message}")]
    LookupFailed { url: String, message: String },

    /// `song_id` does not exist, or the removal target is absent.
    #[error("not found: {resource} {id}")]
    NotFound { resource: String, id: String },

    /// The user already has a vote (owner or additional) on this packet.
    #[error("user {user} has already voted for this packet")]
    AlreadyVoted { user: String },

    /// A transient failure from the underlying store.
    #[error("store error: {0}")]
    Store(#[from] RepositoryError),
}

/// Repository layer specific errors.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database connection failures.
    #[error("database connection failed: {message}")]
    ConnectionFailed { message: String },

    /// SQL query execution failures.
    #[error("query failed: {query} - {message}")]
    QueryFailed { query: String, message: String },

    /// Constraint violations (unique, foreign key, etc.).
    #[error("constraint violation: {constraint} - {message}")]
    ConstraintViolation { constraint: String, message: String },

    /// Record not found.
    #[error("record not found: {table} with {field} = {value}")]
    RecordNotFound {
        table: String,
        field: String,
        value: String,
    },

    /// Migration failures.
    #[error("migration failed: {version} - {message}")]
    MigrationFailed { version: String, message: String },

    /// Passthrough for the underlying sqlx driver.
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl RepositoryError {
    pub fn query_failed<Q: Into<String>, M: Into<String>>(query: Q, message: M) -> Self {
        Self::QueryFailed {
            query: query.into(),
            message: message.into(),
        }
    }

    pub fn record_not_found<T: Into<String>, F: Into<String>, V: Into<String>>(
        table: T,
        field: F,
        value: V,
    ) -> Self {
        Self::RecordNotFound {
            table: table.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn constraint_violation<C: Into<String>, M: Into<String>>(
        constraint: C,
        message: M,
    ) -> Self {
        Self::ConstraintViolation {
            constraint: constraint.into(),
            message: message.into(),
        }
    }
}

/// Web layer specific errors.
#[derive(Error, Debug)]
pub enum WebError {
    /// Invalid request format.
    #[error("invalid request: {field} - {message}")]
    InvalidRequest { field: String, message: String },

    /// JSON parsing errors.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}
