//! `ServerConfig` (§10.3): env vars parsed once at startup, fail-fast on an
//! invalid value, rather than re-read ad hoc from handlers.

use std::env;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub kratos_public_url: String,
    pub session_cookie_secure: bool,
    pub session_cache_ttl_ms: u64,
    pub node_env: String,
    pub bind_addr: String,
}

impl ServerConfig {
    /// Reads and validates every env var the process depends on. Panics with
    /// a descriptive message on a missing/malformed value — a misconfigured
    /// process should never start serving requests.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
        let kratos_public_url = env::var("KRATOS_PUBLIC_URL")
            .map_err(|_| anyhow::anyhow!("KRATOS_PUBLIC_URL must be set"))?;
        let session_cookie_secure = parse_bool_env("SESSION_COOKIE_SECURE", true)?;
        let session_cache_ttl_ms = parse_u64_env("SESSION_CACHE_TTL_MS", 30_000)?;
        let node_env = env::var("NODE_ENV").unwrap_or_else(|_| "production".to_string());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8787".to_string());

        Ok(Self {
            database_url,
            kratos_public_url,
            session_cookie_secure,
            session_cache_ttl_ms,
            node_env,
            bind_addr,
        })
    }

    /// §6: `POST /sync/dev/reset` is gated by `NODE_ENV != "production"`.
    pub fn dev_reset_allowed(&self) -> bool {
        self.node_env != "production"
    }
}

fn parse_bool_env(key: &str, default: bool) -> anyhow::Result<bool> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(v) => v
            .parse::<bool>()
            .map_err(|_| anyhow::anyhow!("{key} must be \"true\" or \"false\", got {v:?}")),
    }
}

fn parse_u64_env(key: &str, default: u64) -> anyhow::Result<u64> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(v) => v
            .parse::<u64>()
            .map_err(|_| anyhow::anyhow!("{key} must be a non-negative integer, got {v:?}")),
    }
}
