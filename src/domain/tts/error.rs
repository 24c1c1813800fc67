use crate::domain::auth::AuthError;

/// Outcome classes of a single synthesis call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("rejected: {0}")]
    Permanent(String),
    #[error("bearer token expired: {0}")]
    AuthExpired(String),
}

impl SynthesisError {
    /// Whether the failure is charged against the retry budget and retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, SynthesisError::RateLimited(_) | SynthesisError::Transient(_))
    }
}

/// Failures that stop a dispatch run as a whole
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("synthesis worker crashed: {0}")]
    Worker(String),
}
