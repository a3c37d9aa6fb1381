//! File system helpers.

pub mod paths;

pub use paths::{ensure_readable_file, ensure_writable_dir, resolve, resolve_from};
