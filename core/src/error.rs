use thiserror::Error;

/// Failures surfaced by a visualization request.
#[derive(Debug, Error)]
pub enum CodeVizError {
    /// The cursor offset does not resolve to any enclosing function.
    #[error("No function found at cursor. Place the cursor inside a function.")]
    NoFunctionFound,
    /// The source could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },
    /// Writing the graph description failed.
    #[error("failed to serialize graph: {0}")]
    Serialization(#[from] std::fmt::Error),
    /// The configuration is unusable.
    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl CodeVizError {
    pub fn parse(message: impl Into<String>) -> Self {
        CodeVizError::Parse {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        CodeVizError::Config {
            message: message.into(),
        }
    }

    /// Whether the error should be shown to the user as-is rather than as a bug.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            CodeVizError::NoFunctionFound | CodeVizError::Parse { .. } | CodeVizError::Config { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CodeVizError>;
