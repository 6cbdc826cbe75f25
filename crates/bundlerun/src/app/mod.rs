//! Application layer: bundle handling and the build/launch pipeline.

pub mod bundle;
pub mod compile;
pub mod launch;
pub mod materialize;
pub mod pack;
pub mod pipeline;
pub mod recorder;
