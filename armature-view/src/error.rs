//! Error types for view rendering

use std::path::PathBuf;
use thiserror::Error;

/// Result type for view operations
pub type Result<T> = std::result::Result<T, ViewError>;

/// Errors that can occur when building or rendering views
///
/// [`View::render`](crate::View::render) and [`View::template`](crate::View::template)
/// only ever return [`ViewError::RenderFailure`]. Construction returns the
/// other variants untranslated. [`View::render_string`](crate::View::render_string)
/// does not use this type at all and surfaces the engine's own error.
#[derive(Error, Debug)]
pub enum ViewError {
    /// The engine failed to resolve, compile or evaluate a template
    #[error("{message}")]
    RenderFailure {
        /// Engine message followed by ` in file <path> line <line>`
        message: String,
        /// The underlying engine error
        #[source]
        source: minijinja::Error,
    },

    /// A search path or namespace directory does not exist
    #[error("The \"{}\" directory does not exist", .0.display())]
    DirectoryNotFound(PathBuf),

    /// The resolved cache path exists but is not a directory
    #[error("Cache path is not a directory: {}", .0.display())]
    InvalidCachePath(PathBuf),

    /// IO error while preparing the cache directory
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration document could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// A blocking render task did not complete
    #[error("Render task failed: {0}")]
    Task(String),
}

impl ViewError {
    /// Code carried by every render failure
    pub const RENDER_FAILURE: u32 = 5050;

    /// Wrap an engine error raised while rendering the template at `file`
    pub fn render_failure(source: minijinja::Error, file: &str, line: usize) -> Self {
        let message = match source.detail() {
            Some(detail) => format!("{}: {}", source.kind(), detail),
            None => source.kind().to_string(),
        };

        ViewError::RenderFailure {
            message: format!("{} in file {} line {}", message, file, line),
            source,
        }
    }

    /// Numeric code of this error (`5050` for render failures, `0` otherwise)
    pub fn code(&self) -> u32 {
        match self {
            ViewError::RenderFailure { .. } => Self::RENDER_FAILURE,
            _ => 0,
        }
    }

    /// The wrapped engine error, if this is a render failure
    pub fn engine_error(&self) -> Option<&minijinja::Error> {
        match self {
            ViewError::RenderFailure { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for ViewError {
    fn from(err: toml::de::Error) -> Self {
        ViewError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ViewError {
    fn from(err: serde_json::Error) -> Self {
        ViewError::Config(err.to_string())
    }
}
