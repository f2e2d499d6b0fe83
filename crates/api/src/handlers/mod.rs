pub mod generation;
pub mod survey;
