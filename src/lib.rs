// Core modules
pub mod api;
pub mod config;
pub mod control;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod strategy;

// Re-export commonly used types
pub use api::*;
pub use models::*;
pub use strategy::TrendPredictor;

// Error handling
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
