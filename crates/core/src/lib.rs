//! Shared data model, configuration, errors and numeric helpers for the
//! LinkPulse attribution and experimentation engine.

pub mod config;
pub mod error;
pub mod stats;
pub mod types;

pub use config::AppConfig;
pub use error::{EngineError, EngineResult};
