use serde::Deserialize;

use crate::allocator::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Shared secret for verifying identity-provider JWTs.
    pub jwt_secret: String,
    /// Expected `iss` claim; skipped when unset.
    pub jwt_issuer: Option<String>,
    /// Attempt ceiling for transient allocation failures.
    /// Set via REGTOKEN_MAX_ALLOC_ATTEMPTS. Default: 5.
    pub max_alloc_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub jitter_ms: u64,
}

impl Config {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_alloc_attempts,
            base_backoff_ms: self.base_backoff_ms,
            max_backoff_ms: self.max_backoff_ms,
            jitter_ms: self.jitter_ms,
        }
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let jwt_secret =
        std::env::var("REGTOKEN_JWT_SECRET").unwrap_or_else(|_| "CHANGE_ME_SHARED_SECRET".into());

    if jwt_secret == "CHANGE_ME_SHARED_SECRET" {
        let env_mode = std::env::var("REGTOKEN_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "REGTOKEN_JWT_SECRET is still the insecure placeholder. \
                 Set the identity provider's shared secret before running in production."
            );
        }
        eprintln!("⚠️  REGTOKEN_JWT_SECRET is not set — using insecure placeholder. Set it for production.");
    }

    Ok(Config {
        port: std::env::var("REGTOKEN_PORT")
            .unwrap_or_else(|_| "8090".into())
            .parse()
            .unwrap_or(8090),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/regtoken".into()),
        jwt_secret,
        jwt_issuer: std::env::var("REGTOKEN_JWT_ISSUER").ok(),
        max_alloc_attempts: std::env::var("REGTOKEN_MAX_ALLOC_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5),
        base_backoff_ms: std::env::var("REGTOKEN_BASE_BACKOFF_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(25),
        max_backoff_ms: std::env::var("REGTOKEN_MAX_BACKOFF_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500),
        jitter_ms: std::env::var("REGTOKEN_JITTER_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(25),
    })
}
