//! Application state management

use crate::auth::jwt::{JwtConfig, TokenService};
use crate::auth::password::PasswordConfig;
use crate::auth::service::AuthService;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use ugin_core::config::AppConfig;
use ugin_core::{AccountStore, ListingPolicy, PostStore, Result, UginError};
use ugin_store::{InMemoryAccountStore, InMemoryPostStore};

/// Run a store call, failing with [`UginError::Timeout`] once `timeout` passes
///
/// The call is not retried.
pub async fn with_deadline<T, F>(timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Store call timed out");
            Err(UginError::Timeout)
        }
    }
}

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Ready status
    pub is_ready: AtomicBool,
    /// Post record store
    pub posts: Arc<dyn PostStore>,
    /// Sort/search allow-lists and page bounds for post listings
    pub listing: ListingPolicy,
    /// Token signing and validation
    pub tokens: Arc<TokenService>,
    /// Signup/signin/refresh/check
    pub auth: AuthService,
    /// Deadline for each store call
    pub store_timeout: Duration,
}

impl AppState {
    /// Create application state over the given stores
    pub fn new(
        config: AppConfig,
        posts: Arc<dyn PostStore>,
        accounts: Arc<dyn AccountStore>,
    ) -> Self {
        Self::with_password_config(config, posts, accounts, PasswordConfig::default())
    }

    /// Like [`AppState::new`] with explicit Argon2 parameters
    pub fn with_password_config(
        config: AppConfig,
        posts: Arc<dyn PostStore>,
        accounts: Arc<dyn AccountStore>,
        passwords: PasswordConfig,
    ) -> Self {
        let tokens = Arc::new(TokenService::new(JwtConfig::from(&config.auth)));
        let store_timeout = Duration::from_millis(config.database.store_timeout_ms);
        let auth = AuthService::new(accounts, tokens.clone(), passwords, store_timeout);

        Self {
            listing: ListingPolicy::posts(&config.listing),
            config,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            is_ready: AtomicBool::new(true),
            posts,
            tokens,
            auth,
            store_timeout,
        }
    }

    /// State backed by fresh in-memory stores
    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryPostStore::new()),
            Arc::new(InMemoryAccountStore::new()),
        )
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }
}
