//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row and the input DTO used for inserts.

pub mod generation;
pub mod job;
pub mod survey;
