//! Error types for stepgraph operations.
//!
//! This module defines [`StepGraphError`], the error type used by everything
//! around a run (configuration, graph validation, report artifacts), and a
//! [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Use `StepGraphError` for failures of the crate's own operations
//! - Step failures and interruptions are never raised; a run collects them
//!   as [`ExecutionError`](crate::runner::ExecutionError) values instead
//! - Steps themselves return `anyhow::Error`, which stays opaque here

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for stepgraph operations.
#[derive(Debug, Error)]
pub enum StepGraphError {
    /// Options file not found at the given location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse an options file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid option value (e.g. from an environment override).
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// The step graph can never complete as declared.
    #[error("Invalid step graph: {message}")]
    InvalidGraph { message: String },

    /// Rendering a report failed.
    #[error("Failed to render {format} report: {message}")]
    ReportRender {
        format: &'static str,
        message: String,
    },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for stepgraph operations.
pub type Result<T> = std::result::Result<T, StepGraphError>;
