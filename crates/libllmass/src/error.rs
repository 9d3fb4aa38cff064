use std::path::PathBuf;

use thiserror::Error;

use llmass_protocol::{SessionName, Ticket};

pub type Result<T> = std::result::Result<T, LlmassError>;

#[derive(Error, Debug)]
pub enum LlmassError {
    #[error("{0}")]
    Validation(String),

    #[error("Session {0} does not exist")]
    SessionNotFound(SessionName),

    #[error("storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt result for ticket {ticket} at {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        ticket: Ticket,
        #[source]
        source: serde_json::Error,
    },

    #[error("Session {session} was cleared while ticket {ticket} was running")]
    SessionCleared { session: SessionName, ticket: Ticket },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse outcome class, mapped to a transport status by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Caller mistake. Reported as a normal message.
    Invalid,
    /// Server-side failure. Logged and reported with a sanitized message.
    Internal,
}

impl LlmassError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LlmassError::Storage {
            path: path.into(),
            source,
        }
    }

    /// Convert to an error class and a message safe to show to callers.
    pub fn to_class(&self) -> (ErrorClass, String) {
        match self {
            LlmassError::Validation(_)
            | LlmassError::SessionNotFound(_)
            | LlmassError::SessionCleared { .. } => {
                (ErrorClass::Invalid, self.to_string())
            }
            LlmassError::Storage { .. } => (ErrorClass::Internal, "storage error".to_string()),
            LlmassError::Corrupt { ticket, .. } => (
                ErrorClass::Internal,
                format!("stored result for ticket {ticket} is unreadable"),
            ),
            LlmassError::Io(_) => (ErrorClass::Internal, "internal I/O error".to_string()),
        }
    }
}
