// Library exports for binary tools and tests
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use sqlx::PgPool;

use config::Config;
use db::PgCredentialStore;
use error::AppResult;
use middleware::rate_limit::RateLimiter;
use services::{
    email::EmailService, session::SessionManager, subscription::SubscriptionService,
    tokens::TokenService,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub tokens: TokenService,
    pub sessions: Arc<SessionManager<PgCredentialStore>>,
    pub subscriptions: Arc<SubscriptionService<PgCredentialStore>>,
    /// `None` when Redis is not configured; limits are then not enforced.
    pub rate_limiter: Option<RateLimiter>,
}

impl AppState {
    pub fn new(
        db: PgPool,
        config: Arc<Config>,
        email: Option<Arc<EmailService>>,
        rate_limiter: Option<RateLimiter>,
    ) -> AppResult<Self> {
        let store = PgCredentialStore::new(db.clone(), config.store_timeout());
        let tokens = TokenService::from_config(&config);
        let sessions = SessionManager::new(
            store.clone(),
            tokens.clone(),
            email,
            config.bcrypt_cost,
            config.app_base_url.clone(),
        )?;

        Ok(Self {
            db,
            tokens,
            sessions: Arc::new(sessions),
            subscriptions: Arc::new(SubscriptionService::new(store)),
            rate_limiter,
            config,
        })
    }
}
