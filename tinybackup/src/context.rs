//! Per-process context handed to every component.

use crate::config::Config;
use crate::utils::errors::Result;
use base64::Engine;
use std::cell::OnceCell;
use std::path::{Path, PathBuf};

/// Explicitly constructed once in `main` and borrowed everywhere else.
#[derive(Debug)]
pub struct Context {
    pub config: Config,
    /// Configuration file this process was started with, relayed to successors
    pub config_path: Option<PathBuf>,
    pub debug: bool,
    pub noop: bool,
    embedded_program: OnceCell<String>,
}

impl Context {
    pub fn new(config: Config, config_path: Option<PathBuf>, debug: bool, noop: bool) -> Self {
        Self {
            config,
            config_path,
            debug,
            noop,
            embedded_program: OnceCell::new(),
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.config.queue.name
    }

    /// Base64 text of the program binary at `program`, read on first use and
    /// cached for the rest of the process.
    pub fn embedded_program(&self, program: &Path) -> Result<&str> {
        if let Some(encoded) = self.embedded_program.get() {
            return Ok(encoded);
        }
        let bytes = std::fs::read(program)?;
        tracing::debug!(
            program = %program.display(),
            bytes = bytes.len(),
            "Encoding program for inline payload"
        );
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Ok(self.embedded_program.get_or_init(|| encoded))
    }
}
