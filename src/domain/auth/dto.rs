use super::token::AuthToken;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifetime assumed when the identity endpoint omits or garbles `expiresAt`
const FALLBACK_TOKEN_LIFETIME_HOURS: i64 = 12;

/// Identity exchange request body
#[derive(Debug, Serialize)]
pub struct IamTokenRequest<'a> {
    pub jwt: &'a str,
}

/// Identity exchange response body
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IamTokenResponse {
    pub iam_token: String,
    pub expires_at: Option<String>,
}

impl IamTokenResponse {
    pub fn into_token(self, issued_at: DateTime<Utc>) -> AuthToken {
        let expires_at = self
            .expires_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc))
            .unwrap_or_else(|| {
                tracing::warn!(
                    raw_expiry = ?self.expires_at,
                    "Token expiry missing or unparseable, assuming {} hours",
                    FALLBACK_TOKEN_LIFETIME_HOURS
                );
                issued_at + Duration::hours(FALLBACK_TOKEN_LIFETIME_HOURS)
            });

        AuthToken::new(self.iam_token, issued_at, expires_at)
    }
}

impl fmt::Debug for IamTokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IamTokenResponse")
            .field("iam_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
