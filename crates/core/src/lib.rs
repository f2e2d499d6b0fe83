//! Domain layer for the NeuroVid generation backend.
//!
//! Pure types and rules shared by the database, pipeline, worker and API
//! crates. Nothing in here performs I/O.

pub mod content;
pub mod error;
pub mod generation;
pub mod model_output;
pub mod prompts;
pub mod queue;
pub mod style;
pub mod submission;
pub mod survey;
pub mod types;
