use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::cookies::CookiePolicy;
use crate::config::Config;
use crate::email::Mailer;
use crate::rate_limit::AttemptLimiter;
use crate::storage::ObjectStore;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub cookies: CookiePolicy,
    pub mailer: Arc<dyn Mailer>,
    /// `None` when no bucket is configured.
    pub storage: Option<Arc<dyn ObjectStore>>,
    pub login_limiter: AttemptLimiter,
    pub otp_limiter: AttemptLimiter,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: Config,
        mailer: Arc<dyn Mailer>,
        storage: Option<Arc<dyn ObjectStore>>,
    ) -> Self {
        let cookies = CookiePolicy::from_client_url(config.client_url.as_deref());
        Self {
            pool,
            config,
            cookies,
            mailer,
            storage,
            login_limiter: AttemptLimiter::for_logins(),
            otp_limiter: AttemptLimiter::for_otps(),
        }
    }

    /// Base URL put into email links.
    pub fn client_url(&self) -> &str {
        self.config
            .client_url
            .as_deref()
            .unwrap_or(&self.config.server_url)
    }
}
