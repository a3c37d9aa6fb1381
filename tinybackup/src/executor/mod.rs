//! Backup executor - performs one backup of one file via logrotate.
//!
//! Each run gets a freshly rendered configuration and a throwaway state
//! file, so nothing is shared between runs and nothing outlives them.

pub mod template;

use crate::utils::errors::{Result, TinyBackupError};
use crate::utils::probe;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// One backup to perform now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupJob {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub keep_revisions: u32,
}

impl BackupJob {
    /// Fail early when the source has gone away; a silent no-op would hide it.
    pub fn check_source(&self) -> Result<()> {
        if self.source.is_file() {
            Ok(())
        } else {
            Err(TinyBackupError::BackupFailed(format!(
                "source file '{}' does not exist",
                self.source.display()
            )))
        }
    }
}

pub trait RotationBackend {
    fn verify(&self) -> Result<()>;

    /// Back up `job.source` now. `dry_run` reports without touching files.
    fn rotate(&self, job: &BackupJob, dry_run: bool) -> Result<()>;
}

pub struct LogrotateExecutor {
    binary: PathBuf,
}

impl LogrotateExecutor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl RotationBackend for LogrotateExecutor {
    fn verify(&self) -> Result<()> {
        let binary = self.binary.to_string_lossy();
        probe::verify_executable(&binary, &["--help"])?;
        Ok(())
    }

    fn rotate(&self, job: &BackupJob, dry_run: bool) -> Result<()> {
        job.check_source()?;

        let conf = template::render(job)?;
        let mut conf_file = NamedTempFile::new()?;
        conf_file.write_all(conf.as_bytes())?;
        conf_file.flush()?;
        debug!(path = %conf_file.path().display(), "logrotate configuration:\n{}", conf);

        let state_file = NamedTempFile::new()?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg(if dry_run { "-vd" } else { "-v" })
            .arg("--state")
            .arg(state_file.path())
            .arg(conf_file.path());
        debug!(command = ?cmd, "Running logrotate");

        let output = cmd.output().map_err(|e| {
            TinyBackupError::BackupFailed(format!("failed to run {}: {}", self.binary.display(), e))
        })?;

        // logrotate -v narrates on stderr.
        let narration = String::from_utf8_lossy(&output.stderr);
        for line in narration.lines().filter(|l| !l.trim().is_empty()) {
            debug!("logrotate: {}", line);
        }

        if !output.status.success() {
            return Err(TinyBackupError::BackupFailed(format!(
                "logrotate exited with {}: {}",
                output.status,
                narration.trim()
            )));
        }

        info!(
            source = %job.source.display(),
            destination = %job.destination.display(),
            keep = job.keep_revisions,
            dry_run,
            "Backup complete"
        );
        Ok(())
    }
}
