use std::num::NonZeroU32;
use std::time::Duration;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    /// Jobs processed at the same time (default: `2`).
    pub concurrency: usize,
    /// Job starts allowed per rate-limit window (default: `5`).
    pub rate_limit_max: NonZeroU32,
    /// Length of the rate-limit window (default: 60 s).
    pub rate_limit_window: Duration,
    /// Delay between queue polls (default: 1 s).
    pub poll_interval: Duration,
    /// How long a claimed job stays invisible to other workers (default: 15 min).
    pub lease: Duration,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default |
    /// |---------------------------------|---------|
    /// | `DATABASE_URL`                  | required |
    /// | `WORKER_CONCURRENCY`            | `2`     |
    /// | `WORKER_RATE_LIMIT_MAX`         | `5`     |
    /// | `WORKER_RATE_LIMIT_WINDOW_SECS` | `60`    |
    /// | `WORKER_POLL_INTERVAL_MS`       | `1000`  |
    /// | `WORKER_LEASE_SECS`             | `900`   |
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let concurrency: usize = std::env::var("WORKER_CONCURRENCY")
            .unwrap_or_else(|_| "2".into())
            .parse()
            .expect("WORKER_CONCURRENCY must be a valid usize");
        assert!(concurrency > 0, "WORKER_CONCURRENCY must be at least 1");

        let rate_limit_max: NonZeroU32 = std::env::var("WORKER_RATE_LIMIT_MAX")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("WORKER_RATE_LIMIT_MAX must be a positive u32");

        let rate_limit_window_secs: u64 = std::env::var("WORKER_RATE_LIMIT_WINDOW_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("WORKER_RATE_LIMIT_WINDOW_SECS must be a valid u64");

        let poll_interval_ms: u64 = std::env::var("WORKER_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("WORKER_POLL_INTERVAL_MS must be a valid u64");

        let lease_secs: u64 = std::env::var("WORKER_LEASE_SECS")
            .unwrap_or_else(|_| "900".into())
            .parse()
            .expect("WORKER_LEASE_SECS must be a valid u64");

        Self {
            database_url,
            concurrency,
            rate_limit_max,
            rate_limit_window: Duration::from_secs(rate_limit_window_secs.max(1)),
            poll_interval: Duration::from_millis(poll_interval_ms.max(1)),
            lease: Duration::from_secs(lease_secs),
        }
    }
}
