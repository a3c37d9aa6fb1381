//! Liveness probes for the external programs tinybackup drives.

use crate::utils::errors::{Result, TinyBackupError};
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Resolve `binary` on PATH and run it once with `args`, expecting success.
///
/// Returns the resolved path so callers can invoke the exact binary that
/// passed the probe.
pub fn verify_executable(binary: &str, args: &[&str]) -> Result<PathBuf> {
    let resolved = which::which(binary).map_err(|e| TinyBackupError::DependencyUnavailable {
        binary: binary.to_string(),
        reason: e.to_string(),
    })?;

    let status = Command::new(&resolved)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| TinyBackupError::DependencyUnavailable {
            binary: binary.to_string(),
            reason: e.to_string(),
        })?;

    if !status.success() {
        return Err(TinyBackupError::DependencyUnavailable {
            binary: binary.to_string(),
            reason: format!("'{} {}' exited with {}", binary, args.join(" "), status),
        });
    }

    tracing::debug!(binary, path = %resolved.display(), "Dependency verified");
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_unavailable() {
        let err = verify_executable("tinybackup-definitely-not-installed", &[]).unwrap_err();
        assert!(matches!(err, TinyBackupError::DependencyUnavailable { .. }));
        assert!(err.to_string().contains("tinybackup-definitely-not-installed"));
    }

    #[test]
    fn test_failing_probe_is_unavailable() {
        let err = verify_executable("sh", &["-c", "exit 1"]).unwrap_err();
        assert!(matches!(err, TinyBackupError::DependencyUnavailable { .. }));
    }

    #[test]
    fn test_working_probe_resolves_path() {
        let path = verify_executable("sh", &["-c", "exit 0"]).unwrap();
        assert!(path.is_absolute());
    }
}
