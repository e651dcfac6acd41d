//! Collaborator protocol
//!
//! Error type shared by every external model seam (selection, query rewrite,
//! call generation) and by the agent as seen from the test runner.

/// Recoverable failure from an external collaborator.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// Call exceeded its time budget
    #[error("timed out after {0}ms")]
    Timeout(u64),
    /// Network or HTTP-level failure
    #[error("transport error: {0}")]
    Transport(String),
    /// Response arrived but could not be decoded into the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// Collaborator answered and reported a failure of its own
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl AgentError {
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::Timeout(_) => "TIMEOUT",
            AgentError::Transport(_) => "TRANSPORT",
            AgentError::InvalidResponse(_) => "INVALID_RESPONSE",
            AgentError::Upstream(_) => "UPSTREAM",
        }
    }
}
