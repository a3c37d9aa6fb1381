//! tinybackup library
//!
//! Recurring single-file backups on hosts that only offer the one-shot at(1)
//! queue: every scheduled job rearms its successor before backing up.

pub mod app;
pub mod cli;
pub mod config;
pub mod context;
pub mod executor;
pub mod filter;
pub mod fingerprint;
pub mod fs;
pub mod installer;
pub mod queue;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use context::Context;
pub use utils::errors::TinyBackupError;
pub type Result<T> = std::result::Result<T, TinyBackupError>;
