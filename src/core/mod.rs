// Public modules
pub mod build_log;
pub mod config;
pub mod error;
pub mod files;
pub mod indexer;
pub mod obfuscate;
pub mod project_tag;
pub mod protect;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
