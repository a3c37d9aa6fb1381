//! Dispatch of one validated invocation.

use crate::cli::{Action, Invocation};
use crate::context::Context;
use crate::executor::{BackupJob, RotationBackend};
use crate::filter::{self, JobFilter};
use crate::fingerprint::FilterLevel;
use crate::installer::{InstallOutcome, Installer, RecurrenceDescriptor};
use crate::queue::{self, QueueBackend};
use crate::utils::errors::{Result, TinyBackupError};
use std::io::Write;
use tracing::{debug, info, warn};

/// Name used in the hints printed when nothing matched.
pub const PROGRAM_NAME: &str = "tinybackup";

/// How a successful invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// A filter matched nothing; informational, exit status 1
    NoMatches,
}

impl Outcome {
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Done => 0,
            Outcome::NoMatches => TinyBackupError::NoMatches.exit_code(),
        }
    }
}

pub struct App<'a, Q: QueueBackend + ?Sized, R: RotationBackend + ?Sized> {
    ctx: &'a Context,
    queue: &'a Q,
    rotator: &'a R,
    installer: Installer<'a, Q>,
}

impl<'a, Q: QueueBackend + ?Sized, R: RotationBackend + ?Sized> App<'a, Q, R> {
    pub fn new(ctx: &'a Context, queue: &'a Q, rotator: &'a R) -> Self {
        Self {
            ctx,
            queue,
            rotator,
            installer: Installer::new(ctx, queue),
        }
    }

    /// Replace the installer, e.g. to pin the program scheduled jobs run.
    pub fn with_installer(mut self, installer: Installer<'a, Q>) -> Self {
        self.installer = installer;
        self
    }

    /// Probe both external dependencies. Nothing else is attempted without them.
    pub fn verify(&self) -> Result<()> {
        self.queue.verify()?;
        self.rotator.verify()?;
        Ok(())
    }

    pub fn execute(&self, invocation: &Invocation, out: &mut dyn Write) -> Result<Outcome> {
        debug!(?invocation, "Executing");
        match invocation.action {
            Action::Install => {
                self.install(&self.descriptor(invocation)?, invocation.identifier.as_deref(), out)?;
                Ok(Outcome::Done)
            }
            Action::Run => {
                self.run(&self.backup_job(invocation)?)?;
                Ok(Outcome::Done)
            }
            Action::RunAndInstall => {
                let descriptor = self.descriptor(invocation)?;
                // Rearm first: a failed backup must not end the chain, and a
                // failed rearm ends it before anything else happens.
                self.install(&descriptor, invocation.identifier.as_deref(), out)?;
                self.run(&descriptor.backup_job())?;
                Ok(Outcome::Done)
            }
            Action::Uninstall(level) => self.uninstall(invocation, level, out),
            Action::Status(level) => self.status(invocation, level, out),
        }
    }

    fn descriptor(&self, invocation: &Invocation) -> Result<RecurrenceDescriptor> {
        invocation.descriptor(self.ctx.queue_name()).ok_or_else(|| {
            TinyBackupError::InvalidInput("installing needs --sourcefile, --destinationdirectory and --time".into())
        })
    }

    fn backup_job(&self, invocation: &Invocation) -> Result<BackupJob> {
        let (source, destination) = invocation.paths.clone().ok_or_else(|| {
            TinyBackupError::InvalidInput("running needs --sourcefile and --destinationdirectory".into())
        })?;
        Ok(BackupJob {
            source,
            destination,
            keep_revisions: invocation.keep_revisions,
        })
    }

    fn install(
        &self,
        descriptor: &RecurrenceDescriptor,
        identifier: Option<&str>,
        out: &mut dyn Write,
    ) -> Result<()> {
        match self.installer.install(descriptor, identifier)? {
            InstallOutcome::Scheduled(submission) => {
                writeln!(
                    out,
                    "Scheduled backup of '{}' to run at '{}' (job {})",
                    descriptor.source.display(),
                    submission.resolved_time,
                    submission.id
                )?;
            }
            InstallOutcome::DryRun { payload } => {
                writeln!(
                    out,
                    "Would schedule at '{}' in queue '{}':\n{}",
                    descriptor.schedule,
                    self.ctx.queue_name(),
                    payload.trim_end()
                )?;
            }
        }
        Ok(())
    }

    fn run(&self, job: &BackupJob) -> Result<()> {
        info!(source = %job.source.display(), "Running backup");
        self.rotator.rotate(job, self.ctx.noop)
    }

    fn search_token(&self, invocation: &Invocation, level: FilterLevel) -> Result<String> {
        if level.needs_time() {
            if let Some(time) = &invocation.time {
                if self.ctx.noop {
                    debug!(time = %time, "Skipping time validation in dry run");
                } else {
                    queue::validate_schedule(self.queue, time)?;
                }
            }
        }
        let token = filter::search_token(
            self.ctx.queue_name(),
            level,
            invocation.path_refs(),
            invocation.time.as_deref(),
        )?;
        debug!(level = %level, token = %token, "Search token");
        Ok(token)
    }

    fn uninstall(&self, invocation: &Invocation, level: FilterLevel, out: &mut dyn Write) -> Result<Outcome> {
        let token = self.search_token(invocation, level)?;
        let report = JobFilter::new(self.ctx, self.queue).uninstall(&token)?;

        if report.is_empty() {
            writeln!(out, "No jobs to remove.\n")?;
            write!(out, "{}", filter::no_match_hints(PROGRAM_NAME, self.ctx.queue_name()))?;
            return Ok(Outcome::NoMatches);
        }

        let verb = if report.dry_run { "Would remove" } else { "Removed" };
        for entry in &report.removed {
            writeln!(out, "{} job {} scheduled for {}", verb, entry.id, entry.schedule)?;
        }
        for entry in &report.failed {
            writeln!(out, "Failed to remove job {} scheduled for {}", entry.id, entry.schedule)?;
        }
        write_unreadable(out, &report.unreadable)?;
        if !report.failed.is_empty() {
            warn!(failed = report.failed.len(), "Some jobs could not be removed");
            return Err(TinyBackupError::PartialRemoval(
                report.failed.iter().map(|e| e.id).collect(),
            ));
        }
        if !report.unreadable.is_empty() {
            return Err(TinyBackupError::Uninspectable(report.unreadable));
        }
        Ok(Outcome::Done)
    }

    fn status(&self, invocation: &Invocation, level: FilterLevel, out: &mut dyn Write) -> Result<Outcome> {
        let token = self.search_token(invocation, level)?;
        let matches = JobFilter::new(self.ctx, self.queue).status(&token)?;

        if matches.jobs.is_empty() && matches.unreadable.is_empty() {
            writeln!(out, "No matching jobs.\n")?;
            write!(out, "{}", filter::no_match_hints(PROGRAM_NAME, self.ctx.queue_name()))?;
            return Ok(Outcome::NoMatches);
        }

        for job in &matches.jobs {
            writeln!(out, "Job {} scheduled for {}", job.entry.id, job.entry.schedule)?;
            writeln!(out, "    {}", job.display_command())?;
        }
        write_unreadable(out, &matches.unreadable)?;
        if !matches.unreadable.is_empty() {
            return Err(TinyBackupError::Uninspectable(matches.unreadable));
        }
        Ok(Outcome::Done)
    }
}

/// Jobs the filter could not look into may or may not have matched.
fn write_unreadable(out: &mut dyn Write, ids: &[u64]) -> Result<()> {
    for id in ids {
        writeln!(out, "Could not inspect job {}", id)?;
    }
    Ok(())
}
