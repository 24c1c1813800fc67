use crate::domain::auth::dto::{IamTokenRequest, IamTokenResponse};
use crate::domain::auth::AuthError;
use async_trait::async_trait;
use std::time::Duration;

pub const DEFAULT_IAM_TOKEN_URL: &str = "https://iam.api.cloud.yandex.net/iam/v1/tokens";

/// Exchanges a signed assertion for a bearer token
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Audience the assertion must be addressed to
    fn audience(&self) -> &str;

    async fn exchange(&self, assertion: &str) -> Result<IamTokenResponse, AuthError>;
}

/// HTTP client for the IAM token endpoint
pub struct IamTokenExchange {
    token_url: String,
    http_client: reqwest::Client,
}

impl IamTokenExchange {
    pub fn new(token_url: String, timeout: Duration) -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Exchange(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            token_url,
            http_client,
        })
    }
}

#[async_trait]
impl TokenExchange for IamTokenExchange {
    fn audience(&self) -> &str {
        &self.token_url
    }

    async fn exchange(&self, assertion: &str) -> Result<IamTokenResponse, AuthError> {
        let response = self
            .http_client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .json(&IamTokenRequest { jwt: assertion })
            .send()
            .await
            .map_err(|e| AuthError::Exchange(format!("IAM token exchange failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body: error_text,
            });
        }

        response
            .json::<IamTokenResponse>()
            .await
            .map_err(|e| AuthError::Exchange(format!("Failed to parse IAM token: {}", e)))
    }
}
