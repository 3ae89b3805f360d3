use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for doc-build operations
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("annotated tag is not a valid version number: '{0}'")]
    InvalidVersionTag(String),

    #[error("{tool} failed ({status}){detail}")]
    ExternalToolFailure {
        tool: String,
        status: String,
        detail: String,
    },

    #[error("document did not stabilize after {runs} runs")]
    StabilizationLimitReached { runs: usize },

    #[error("Describe error: {0}")]
    Describe(String),

    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task graph error: {0}")]
    Graph(String),

    #[error("Build state error in {}: {message}", path.display())]
    State { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in doc-build
pub type Result<T> = std::result::Result<T, BuildError>;

impl BuildError {
    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        BuildError::Config(msg.into())
    }

    /// Create a describe error with context
    pub fn describe(msg: impl Into<String>) -> Self {
        BuildError::Describe(msg.into())
    }

    /// Create a task graph error with context
    pub fn graph(msg: impl Into<String>) -> Self {
        BuildError::Graph(msg.into())
    }

    /// Create an external tool failure.
    ///
    /// `detail` is appended after a colon and newline when non-empty.
    pub fn tool_failure(
        tool: impl Into<String>,
        status: impl Into<String>,
        detail: impl AsRef<str>,
    ) -> Self {
        let detail = detail.as_ref().trim_end();
        BuildError::ExternalToolFailure {
            tool: tool.into(),
            status: status.into(),
            detail: if detail.is_empty() {
                String::new()
            } else {
                format!(":\n{}", detail)
            },
        }
    }

    /// Create a build state error for the state file at `path`
    pub fn state(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        BuildError::State {
            path: path.into(),
            message: msg.into(),
        }
    }
}
