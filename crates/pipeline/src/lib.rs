//! The asynchronous generation pipeline.
//!
//! Intake creates a record and enqueues a job, the worker drives the record
//! through script, quiz and video stages, and the status service projects
//! the record for polling clients. Storage, the queue and the AI providers
//! sit behind traits so the same logic runs against PostgreSQL in production
//! and against [`memory`] in tests.

pub mod error;
pub mod intake;
pub mod memory;
pub mod pipeline;
pub mod providers;
pub mod queue;
pub mod status;
pub mod store;

pub use error::{PipelineError, ServiceError};
pub use intake::{IntakeService, SubmitReceipt};
pub use pipeline::GenerationPipeline;
pub use queue::{ClaimedJob, JobHandle, JobQueue, PgJobQueue, QueueError};
pub use status::StatusService;
pub use store::{GenerationStore, PgGenerationStore, PgSurveyStore, StoreError, SurveyStore};
