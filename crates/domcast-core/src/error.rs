use thiserror::Error;

pub type DomcastResult<T> = Result<T, DomcastError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomcastError {
    /// A value in the command stream has no wire representation.
    #[error("cannot serialize value at {path}: {reason}")]
    Serialization { path: String, reason: String },
    /// A name-dispatched command was called with arguments it cannot accept.
    #[error("invalid arguments for '{command}': {reason}")]
    InvalidArguments { command: String, reason: String },
    #[error("invalid build config: {0}")]
    Config(String),
}

impl DomcastError {
    pub fn serialization(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Serialization {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_arguments(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            command: command.into(),
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Serialization { .. } => "DOMCAST_E_SERIALIZE",
            Self::InvalidArguments { .. } => "DOMCAST_E_ARGS",
            Self::Config(_) => "DOMCAST_E_CONFIG",
        }
    }
}
