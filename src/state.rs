use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::cookie::SessionCookie;
use crate::auth::password::PasswordHasher;
use crate::auth::token::TokenSigner;
use crate::config::Config;
use crate::media::MediaStore;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub tokens: Arc<TokenSigner>,
    pub passwords: PasswordHasher,
    pub cookie: SessionCookie,
    pub media: Arc<dyn MediaStore>,
}

impl AppState {
    /// Wire up token signing, hashing and cookies from config.
    pub fn new(db: DbPool, config: Config, media: Arc<dyn MediaStore>) -> anyhow::Result<Self> {
        let ttl = crate::auth::token::parse_expiry(&config.auth.token_expiry)?;
        let tokens = match config.auth.token_secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => TokenSigner::new(secret, ttl),
            None if config.server.mode.is_production() => {
                anyhow::bail!("JWT_SECRET must be set in production mode")
            }
            None => {
                tracing::warn!("No token secret configured; sessions will not survive a restart");
                TokenSigner::ephemeral(ttl)
            }
        };

        Ok(Self {
            passwords: PasswordHasher::new(config.auth.bcrypt_cost),
            cookie: SessionCookie::new(config.auth.cookie_name.clone(), config.server.mode),
            tokens: Arc::new(tokens),
            db,
            config,
            media,
        })
    }
}
