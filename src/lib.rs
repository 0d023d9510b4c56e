pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod notifications;
pub mod utils;

pub use db::DbPool;

use std::sync::Arc;

use crate::api::rate_limit::RateLimiter;
use crate::notifications::email::SystemEmailService;
use config::Config;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub email: Arc<SystemEmailService>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let email = Arc::new(SystemEmailService::new(config.email.clone()));
        Self {
            config,
            db,
            email,
            rate_limiter,
        }
    }
}
