use super::error::AuthError;
use super::jwt::ServiceAccountKey;
use super::token::AuthToken;
use crate::infrastructure::iam::TokenExchange;
use async_trait::async_trait;
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Source of bearer tokens for synthesis calls
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a token that stays valid for at least the refresh margin
    async fn get_token(&self) -> Result<AuthToken, AuthError>;

    /// Drop `stale` from the cache if it is still the cached token.
    ///
    /// Returns `true` only for the call that actually dropped it.
    fn invalidate(&self, stale: &AuthToken) -> bool;
}

type RefreshFuture = Shared<BoxFuture<'static, Result<AuthToken, AuthError>>>;

#[derive(Default)]
struct SignerState {
    cached: Option<AuthToken>,
    in_flight: Option<RefreshFuture>,
}

/// Caches the bearer token and refreshes it through a single shared exchange
pub struct CredentialSigner {
    key: Arc<ServiceAccountKey>,
    exchange: Arc<dyn TokenExchange>,
    refresh_margin: chrono::Duration,
    state: Mutex<SignerState>,
    exchanges: Arc<AtomicU64>,
}

impl CredentialSigner {
    pub fn new(
        key: ServiceAccountKey,
        exchange: Arc<dyn TokenExchange>,
        refresh_margin: Duration,
    ) -> Self {
        Self {
            key: Arc::new(key),
            exchange,
            refresh_margin: chrono::Duration::from_std(refresh_margin)
                .unwrap_or_else(|_| chrono::Duration::seconds(60)),
            state: Mutex::new(SignerState::default()),
            exchanges: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of identity exchanges performed so far
    pub fn exchange_count(&self) -> u64 {
        self.exchanges.load(Ordering::SeqCst)
    }

    fn start_refresh(&self) -> RefreshFuture {
        let key = Arc::clone(&self.key);
        let exchange = Arc::clone(&self.exchange);
        let exchanges = Arc::clone(&self.exchanges);

        async move {
            let issued_at = Utc::now();
            let assertion = key.sign_assertion(exchange.audience(), issued_at)?;
            exchanges.fetch_add(1, Ordering::SeqCst);

            let response = exchange.exchange(&assertion).await.map_err(|e| {
                tracing::error!(error = %e, "Identity exchange failed");
                e
            })?;
            let token = response.into_token(issued_at);

            tracing::info!(
                key_id = key.key_id(),
                expires_at = %token.expires_at,
                "Bearer token refreshed"
            );
            Ok(token)
        }
        .boxed()
        .shared()
    }
}

impl fmt::Debug for CredentialSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CredentialSigner")
            .field("key", &self.key)
            .field("audience", &self.exchange.audience())
            .field("cached", &state.cached)
            .field("refreshing", &state.in_flight.is_some())
            .field("exchanges", &self.exchange_count())
            .finish()
    }
}

#[async_trait]
impl TokenProvider for CredentialSigner {
    async fn get_token(&self) -> Result<AuthToken, AuthError> {
        let refresh = {
            let mut state = self.state.lock();
            if let Some(token) = &state.cached {
                if token.is_usable_at(Utc::now(), self.refresh_margin) {
                    return Ok(token.clone());
                }
            }
            match &state.in_flight {
                Some(in_flight) => in_flight.clone(),
                None => {
                    tracing::debug!("No usable bearer token cached, starting refresh");
                    let refresh = self.start_refresh();
                    state.in_flight = Some(refresh.clone());
                    refresh
                }
            }
        };

        let result = refresh.clone().await;

        // First waiter to finish publishes the result; later ones find the slot already cleared
        let mut state = self.state.lock();
        if state
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.ptr_eq(&refresh))
        {
            state.in_flight = None;
            if let Ok(token) = &result {
                state.cached = Some(token.clone());
            }
        }
        result
    }

    fn invalidate(&self, stale: &AuthToken) -> bool {
        let mut state = self.state.lock();
        match &state.cached {
            Some(cached) if cached.value == stale.value => {
                tracing::warn!(expires_at = %stale.expires_at, "Bearer token rejected, dropping it");
                state.cached = None;
                true
            }
            _ => false,
        }
    }
}
