use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Short-lived bearer credential for synthesis calls
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub value: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn new(value: impl Into<String>, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            issued_at,
            expires_at,
        }
    }

    /// Usable only while `now + margin` is still before expiry
    pub fn is_usable_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin < self.expires_at
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("value", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
