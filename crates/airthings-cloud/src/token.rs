//! Access token cache
//!
//! Holds at most one token and renews it through a [`TokenExchange`]
//! when it has expired. The lock is held across the renewal so that
//! concurrent callers share one exchange instead of racing.

use crate::error::{CloudError, CloudResult};
use crate::types::{AccessTokenResponse, Credentials, Token};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Something that can turn client credentials into an access token
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange(&self, credentials: &Credentials) -> CloudResult<AccessTokenResponse>;
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Single-token cache with expiry
pub struct TokenCache {
    exchange: Arc<dyn TokenExchange>,
    credentials: Credentials,
    safety_margin: Duration,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<Token>>,
    renewals: AtomicU64,
}

impl TokenCache {
    /// Create an empty cache using the system clock
    pub fn new(
        exchange: Arc<dyn TokenExchange>,
        credentials: Credentials,
        safety_margin: Duration,
    ) -> Self {
        Self::with_clock(exchange, credentials, safety_margin, Arc::new(SystemClock))
    }

    /// Create an empty cache with an explicit clock
    pub fn with_clock(
        exchange: Arc<dyn TokenExchange>,
        credentials: Credentials,
        safety_margin: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            exchange,
            credentials,
            safety_margin,
            clock,
            cached: Mutex::new(None),
            renewals: AtomicU64::new(0),
        }
    }

    /// Return a token that is valid now, renewing if needed
    ///
    /// On a failed renewal the cache is left empty, so the next call
    /// tries again.
    pub async fn ensure_valid(&self) -> CloudResult<Token> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_valid_at(self.clock.now()) {
                return Ok(token.clone());
            }
            debug!(expired_at = %token.expires_at(), "Access token expired");
        }

        *cached = None;

        let response = match self.exchange.exchange(&self.credentials).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Token renewal failed: {}", e);
                return Err(e.into_auth());
            }
        };

        let token = self.token_from_response(response)?;
        self.renewals.fetch_add(1, Ordering::Relaxed);
        info!(expires_at = %token.expires_at(), "Obtained new access token");

        *cached = Some(token.clone());
        Ok(token)
    }

    /// Drop the cached token
    pub async fn clear(&self) {
        let mut cached = self.cached.lock().await;
        *cached = None;
    }

    /// Whether a token is currently held, valid or not
    pub async fn is_cached(&self) -> bool {
        self.cached.lock().await.is_some()
    }

    /// Number of successful renewals since creation
    pub fn renewals(&self) -> u64 {
        self.renewals.load(Ordering::Relaxed)
    }

    fn token_from_response(&self, response: AccessTokenResponse) -> CloudResult<Token> {
        if response.access_token.is_empty() {
            return Err(CloudError::Auth("token endpoint returned an empty token".to_string()));
        }

        let margin = i64::try_from(self.safety_margin.as_secs()).unwrap_or(i64::MAX);
        let lifetime = response.expires_in.saturating_sub(margin);
        if lifetime <= 0 {
            return Err(CloudError::Auth(format!(
                "token lifetime of {}s does not exceed the {}s safety margin",
                response.expires_in, margin
            )));
        }

        let expires_at = TimeDelta::try_seconds(lifetime)
            .and_then(|delta| self.clock.now().checked_add_signed(delta))
            .ok_or_else(|| {
                CloudError::Auth(format!("token lifetime out of range: {}s", response.expires_in))
            })?;

        Ok(Token::new(response.access_token, expires_at))
    }
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("credentials", &self.credentials)
            .field("safety_margin", &self.safety_margin)
            .field("renewals", &self.renewals())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex as SyncMutex;

    /// Clock that only moves when told to
    pub struct ManualClock {
        now: SyncMutex<DateTime<Utc>>,
    }

    impl ManualClock {
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                now: SyncMutex::new(start),
            }
        }

        pub fn advance(&self, secs: i64) {
            let mut now = self.now.lock();
            *now += TimeDelta::seconds(secs);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock()
        }
    }
}
