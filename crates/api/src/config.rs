use neurovid_core::submission::GENERATION_QUOTA;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3005`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Accept the `x-test-user-id` header in place of a bearer token.
    /// Never enable outside local development.
    pub allow_test_header: bool,
    /// Lifetime generation requests per principal (default: `3`).
    pub generation_quota: i64,
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `HOST`                   | `0.0.0.0`               |
    /// | `PORT`                   | `3005`                  |
    /// | `CORS_ORIGINS`           | `http://localhost:3000` |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                    |
    /// | `AUTH_ALLOW_TEST_HEADER` | `false`                 |
    /// | `GENERATION_QUOTA`       | `3`                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3005".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let allow_test_header: bool = std::env::var("AUTH_ALLOW_TEST_HEADER")
            .unwrap_or_else(|_| "false".into())
            .parse()
            .expect("AUTH_ALLOW_TEST_HEADER must be true or false");

        let generation_quota: i64 = std::env::var("GENERATION_QUOTA")
            .unwrap_or_else(|_| GENERATION_QUOTA.to_string())
            .parse()
            .expect("GENERATION_QUOTA must be a valid i64");
        assert!(generation_quota > 0, "GENERATION_QUOTA must be at least 1");

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            allow_test_header,
            generation_quota,
            jwt,
        }
    }
}
