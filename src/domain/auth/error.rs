/// Credential failures. All of them are fatal to a run.
///
/// `Clone` so a single shared refresh can hand the same error to every waiting caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid service account key: {0}")]
    InvalidKey(String),
    #[error("unsupported key algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("failed to sign assertion: {0}")]
    Signing(String),
    #[error("key pair verification failed: {0}")]
    KeyPairMismatch(String),
    #[error("identity exchange failed: {0}")]
    Exchange(String),
    #[error("identity exchange rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("bearer token kept expiring after {0} forced refreshes")]
    RefreshLimitExceeded(u32),
}
