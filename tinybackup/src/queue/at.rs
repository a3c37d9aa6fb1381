//! at(1) queue backend.
//!
//! | Operation | Command                   |
//! |-----------|---------------------------|
//! | submit    | `at -q <queue> <when>` (payload on stdin) |
//! | list      | `at -l -q <queue>`        |
//! | inspect   | `at -c <id>`              |
//! | cancel    | `at -r <id>`              |

use super::{Listing, QueueBackend, Submission};
use crate::utils::errors::{Result, TinyBackupError};
use crate::utils::probe;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use tracing::debug;

pub struct AtQueue {
    binary: PathBuf,
    queue: String,
}

impl AtQueue {
    pub fn new(binary: impl Into<PathBuf>, queue: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            queue: queue.into(),
        }
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        debug!(command = ?cmd, "Running queue command");
        cmd
    }

    fn run(&self, mut cmd: Command) -> Result<Output> {
        cmd.stdin(Stdio::null()).output().map_err(|e| {
            TinyBackupError::Backend(format!("failed to run {}: {}", self.binary.display(), e))
        })
    }
}

/// Pull `(id, time)` out of at's `job <N> at <time>` confirmation.
pub fn parse_confirmation(output: &str) -> Option<Submission> {
    output.lines().find_map(|line| {
        let rest = &line[line.find("job ")? + 4..];
        let (id, tail) = rest.split_once(' ')?;
        let resolved_time = tail.trim_start().strip_prefix("at")?.trim();
        if resolved_time.is_empty() {
            return None;
        }
        Some(Submission {
            id: id.parse().ok()?,
            resolved_time: resolved_time.to_string(),
        })
    })
}

impl QueueBackend for AtQueue {
    fn queue_name(&self) -> &str {
        &self.queue
    }

    fn verify(&self) -> Result<()> {
        // at has no --help that exits 0; listing is the cheapest harmless call.
        let binary = self.binary.to_string_lossy();
        probe::verify_executable(&binary, &["-l"])?;
        Ok(())
    }

    fn submit(&self, payload: &str, when: &str) -> Result<Submission> {
        let mut cmd = self.command(["-q", self.queue.as_str(), when]);
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                TinyBackupError::Backend(format!("failed to run {}: {}", self.binary.display(), e))
            })?;

        // at parses the time before reading stdin and exits on a bad one,
        // so a large payload can hit a closed pipe. The exit status decides.
        let mut short_write = false;
        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(payload.as_bytes()) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    debug!("at closed its input before the payload was written");
                    short_write = true;
                }
                Err(e) => return Err(e.into()),
            }
        }
        let output = child.wait_with_output()?;

        // at reports both the confirmation and its errors on stderr.
        let text = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stderr),
            String::from_utf8_lossy(&output.stdout)
        );
        debug!(status = %output.status, output = %text.trim(), "at submission finished");

        if !output.status.success() {
            return Err(TinyBackupError::SubmissionRejected(text.trim().to_string()));
        }
        if short_write {
            return Err(TinyBackupError::SubmissionUnconfirmed {
                output: format!("at accepted a truncated payload: {}", text.trim()),
            });
        }
        parse_confirmation(&text).ok_or_else(|| TinyBackupError::SubmissionUnconfirmed {
            output: text.trim().to_string(),
        })
    }

    fn list(&self) -> Result<Listing> {
        let output = self.run(self.command(["-l", "-q", self.queue.as_str()]))?;
        if !output.status.success() {
            return Err(TinyBackupError::Backend(format!(
                "listing queue '{}' failed: {}",
                self.queue,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(Listing::new(String::from_utf8_lossy(&output.stdout).into_owned()))
    }

    fn inspect(&self, id: u64) -> Result<String> {
        let output = self.run(self.command(["-c".to_string(), id.to_string()]))?;
        if !output.status.success() {
            return Err(TinyBackupError::Backend(format!(
                "inspecting job {} failed: {}",
                id,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn cancel(&self, id: u64) -> Result<()> {
        // at -r prints nothing useful either way; only the status counts.
        let output = self.run(self.command(["-r".to_string(), id.to_string()]))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(TinyBackupError::CancelFailed(id))
        }
    }
}
