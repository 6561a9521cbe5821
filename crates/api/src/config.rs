use std::time::Duration;

use kinship_core::error::CoreError;
use kinship_core::trust::TrustLadder;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long post-shutdown cleanup waits for background tasks (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Upper bound on a single write to one session (default: `2000` ms).
    pub session_write_timeout_ms: u64,
    /// Outbound buffer per session (default: `64` messages).
    pub session_channel_capacity: usize,
    /// Optional JSON file replacing the built-in trust ladder.
    pub trust_levels_path: Option<String>,
    /// JWT token configuration.
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                    |
    /// |----------------------------|----------------------------|
    /// | `HOST`                     | `0.0.0.0`                  |
    /// | `PORT`                     | `3000`                     |
    /// | `CORS_ORIGINS`             | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`    | `30`                       |
    /// | `SESSION_WRITE_TIMEOUT_MS` | `2000`                     |
    /// | `SESSION_CHANNEL_CAPACITY` | `64`                       |
    /// | `TRUST_LEVELS_PATH`        | unset (built-in ladder)    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let session_write_timeout_ms: u64 = std::env::var("SESSION_WRITE_TIMEOUT_MS")
            .unwrap_or_else(|_| "2000".into())
            .parse()
            .expect("SESSION_WRITE_TIMEOUT_MS must be a valid u64");

        let session_channel_capacity: usize = std::env::var("SESSION_CHANNEL_CAPACITY")
            .unwrap_or_else(|_| "64".into())
            .parse()
            .expect("SESSION_CHANNEL_CAPACITY must be a valid usize");
        assert!(
            session_channel_capacity > 0,
            "SESSION_CHANNEL_CAPACITY must be greater than zero"
        );

        let trust_levels_path = std::env::var("TRUST_LEVELS_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty());

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            session_write_timeout_ms,
            session_channel_capacity,
            trust_levels_path,
            jwt,
        }
    }

    pub fn session_write_timeout(&self) -> Duration {
        Duration::from_millis(self.session_write_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Load the trust ladder once at start-up.
    ///
    /// Reads `trust_levels_path` when set, otherwise returns the built-in
    /// five-level ladder.
    pub fn load_trust_ladder(&self) -> Result<TrustLadder, CoreError> {
        match &self.trust_levels_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    CoreError::Internal(format!("failed to read trust levels from {path}: {e}"))
                })?;
                TrustLadder::from_json(&raw)
            }
            None => Ok(TrustLadder::default()),
        }
    }
}
