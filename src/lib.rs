// Core modules
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod logging;
pub mod models;
pub mod strategy;
pub mod venue;

// Re-export commonly used types
pub use crate::config::AgentConfig;
pub use crate::error::AgentError;
pub use crate::models::*;

// Error handling
pub type Result<T> = std::result::Result<T, AgentError>;
