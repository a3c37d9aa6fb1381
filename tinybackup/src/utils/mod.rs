//! Utility modules for tinybackup.

pub mod errors;
pub mod logger;
pub mod probe;

pub use errors::{Result, TinyBackupError};
