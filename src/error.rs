//! Error types for PromptWeave
//!
//! This module defines all error types used throughout the expansion engine.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.
//!
//! Most of these never reach a caller of [`crate::engine::Expander::expand`]:
//! directive-local failures are recovered inside the pass. Only load-time
//! structural failures (configuration, built-in catalog) propagate.

use thiserror::Error;

/// The primary error type for PromptWeave operations.
#[derive(Error, Debug)]
pub enum WeaveError {
    /// Configuration-related errors (unreadable config, bad paths, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A directive evaluator failed (bad arguments, upstream I/O failure, etc.)
    #[error("Directive error: {0}")]
    Directive(String),

    /// A custom directive document or entry could not be used.
    #[error("Malformed directive: {0}")]
    MalformedDirective(String),

    /// Durable storage failures (unwritable file, corrupt contents, etc.)
    #[error("Storage error: {0}")]
    Storage(String),

    /// The host collaborator could not answer a query.
    #[error("Host error: {0}")]
    Host(String),

    /// A bounded operation ran past its time budget.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Nested expansion went deeper than the configured limit.
    #[error("Recursion limit reached: {0}")]
    Recursion(String),

    /// Resource not found (directives, variables, files, etc.)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Pattern compilation errors
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

/// A specialized `Result` type for PromptWeave operations.
pub type Result<T> = std::result::Result<T, WeaveError>;
