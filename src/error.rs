//! Centralized error types for mailframe.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailframe library.
#[derive(Error, Debug)]
pub enum RenderError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("Email file not found: {0}")]
    FileNotFound(PathBuf),

    /// A MIME decoding error.
    #[error("MIME decoding error: {0}")]
    MimeError(String),

    /// No sanitizer is configured and the policy refuses unsanitized output.
    #[error("No HTML sanitizer available and unsanitized rendering is not allowed")]
    SanitizerUnavailable,

    /// A theme value other than "dark", "light" or "auto".
    #[error("Invalid theme: {0}")]
    InvalidTheme(String),

    /// The render was superseded by a newer render for the same container.
    #[error("Render cancelled by a newer render of the same container")]
    Cancelled,

    /// The host dropped a frame's event channel before it loaded.
    #[error("Frame {0} was detached before it finished loading")]
    HostDetached(u64),
}

/// Convenience alias for `Result<T, RenderError>`.
pub type Result<T> = std::result::Result<T, RenderError>;

impl RenderError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
