//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod generation_repo;
pub mod job_repo;
pub mod survey_repo;

pub use generation_repo::{CreateOutcome, GenerationRepo};
pub use job_repo::JobRepo;
pub use survey_repo::SurveyRepo;
