//! Generation worker: configuration and the job pool that drives
//! [`neurovid_pipeline::GenerationPipeline`] from the durable queue.

pub mod config;
pub mod pool;

pub use config::WorkerConfig;
pub use pool::{execute_job, JobOutcome, PoolSettings, WorkerPool};
