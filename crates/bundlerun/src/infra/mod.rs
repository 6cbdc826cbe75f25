//! Infrastructure adapters for config, logging, persistence, and external processes.

pub mod config;
pub mod logging;
pub mod store;
pub mod toolchain;
