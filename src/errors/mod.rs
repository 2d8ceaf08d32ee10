//! Error type definitions for the jukebox scheduler.
//!
//! Mirrors the error taxonomy in the specification: a small top-level
//! [`AppError`] that wraps layer-specific errors, each of which maps
//! cleanly onto an HTTP status code at the web boundary.

mod types;

pub use types::{AppError, RepositoryError, SchedulerError, WebError};
