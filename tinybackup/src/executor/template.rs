//! logrotate configuration for one backup run.

use super::BackupJob;
use crate::utils::errors::{Result, TinyBackupError};

const TEMPLATE: &str = include_str!("../../templates/logrotate.conf");

/// Substitute the job parameters into the bundled template.
pub fn render(job: &BackupJob) -> Result<String> {
    let source = config_path(&job.source)?;
    let destination = config_path(&job.destination)?;

    Ok(TEMPLATE
        .replace("$LOGROTATE_SOURCE_FILE", &source)
        .replace("$LOGROTATE_KEEP_REVISIONS", &job.keep_revisions.to_string())
        .replace("$LOGROTATE_DESTINATION_FOLDER", &destination))
}

/// logrotate quotes with `"` and knows no escapes, so those paths cannot be
/// expressed at all.
fn config_path(path: &std::path::Path) -> Result<String> {
    let text = path.to_str().ok_or_else(|| {
        TinyBackupError::InvalidInput(format!("'{}' is not valid UTF-8", path.display()))
    })?;
    if text.contains(['"', '\n', '\r']) {
        return Err(TinyBackupError::InvalidInput(format!(
            "'{}' cannot be used in a logrotate configuration",
            path.display()
        )));
    }
    Ok(text.to_string())
}
