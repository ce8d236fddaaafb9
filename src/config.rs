use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub host: String,
    pub port: u16,
    /// Public deployment host (`VERCEL_URL`), without scheme.
    pub public_host: Option<String>,
    /// Caller identifier placed in the procedure context when no session is present.
    pub anonymous_caller_id: String,
    pub procedure_timeout: Duration,
}

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_ANONYMOUS_CALLER_ID: &str = "user_123";
pub const DEFAULT_PROCEDURE_TIMEOUT: Duration = Duration::from_secs(5);

impl AppConfig {
    /// Deployed behind a public HTTPS origin.
    pub fn serves_https(&self) -> bool {
        self.public_host.is_some()
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "nodebase".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "nodebase-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };
        let procedure_timeout = std::env::var("PROCEDURE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_PROCEDURE_TIMEOUT);

        Ok(Self {
            database_url,
            jwt,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("APP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(DEFAULT_PORT),
            public_host: std::env::var("VERCEL_URL").ok().filter(|v| !v.is_empty()),
            anonymous_caller_id: std::env::var("ANONYMOUS_CALLER_ID")
                .unwrap_or_else(|_| DEFAULT_ANONYMOUS_CALLER_ID.into()),
            procedure_timeout,
        })
    }
}
