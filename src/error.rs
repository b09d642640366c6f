//! Error kinds surfaced by a chat turn.
//!
//! Every variant carries the exact text shown to the user, so a turn can
//! always end in displayable output while callers still match on the kind.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    DependencyUnavailable,
    UpstreamEmpty,
    Transport,
    ToolNotFound,
    ArgumentDecode,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    DependencyUnavailable(String),
    #[error("{0}")]
    UpstreamEmpty(String),
    #[error("{0}")]
    Transport(String),
    #[error("Unknown tool requested: {0}")]
    ToolNotFound(String),
    #[error("Failed to decode arguments for '{tool}': {reason}")]
    ArgumentDecode { tool: String, reason: String },
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::Validation(_) => ErrorKind::Validation,
            ChatError::DependencyUnavailable(_) => ErrorKind::DependencyUnavailable,
            ChatError::UpstreamEmpty(_) => ErrorKind::UpstreamEmpty,
            ChatError::Transport(_) => ErrorKind::Transport,
            ChatError::ToolNotFound(_) => ErrorKind::ToolNotFound,
            ChatError::ArgumentDecode { .. } => ErrorKind::ArgumentDecode,
        }
    }

    pub fn argument_decode(tool: &str, reason: impl Into<String>) -> Self {
        ChatError::ArgumentDecode {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }
}
