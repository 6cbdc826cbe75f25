//! Core domain types shared by the pipeline stages.

pub mod errors;
pub mod model;
