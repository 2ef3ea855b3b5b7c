//! Augury - Time-slot statistical catalogation and signal lifecycle engine

pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

// Re-export commonly used types
pub use config::{Config, CycleSettings};
pub use error::{AppError, Result};
pub use types::*;
