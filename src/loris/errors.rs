//! Error types for the LORIS API client.

use crate::loris::client::TransportError;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum LorisApiError {
    /// The session cookies were rejected. Terminal for the whole crawl.
    #[error("LORIS session is invalid or expired: {0}")]
    InvalidSession(String),
    #[error("Failed to parse response")]
    ParseFailed {
        status: u16,
        url: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("{operation} failed after {attempts} attempts")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        elapsed: Duration,
        #[source]
        source: anyhow::Error,
    },
    #[error("search form reset failed: {0}")]
    ResetFailed(String),
    #[error("total course count unavailable for term {term}")]
    TotalCountUnavailable {
        term: String,
        #[source]
        source: Option<Box<LorisApiError>>,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    RequestFailed(#[from] anyhow::Error),
}

impl LorisApiError {
    /// Whether this error must stop every remaining term, not just the current unit of work.
    pub fn is_session_fatal(&self) -> bool {
        match self {
            Self::InvalidSession(_) => true,
            Self::TotalCountUnavailable {
                source: Some(inner),
                ..
            } => inner.is_session_fatal(),
            _ => false,
        }
    }
}
