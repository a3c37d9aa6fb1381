//! Self-propagating installer.
//!
//! A scheduled occurrence must still work after the managing binary has been
//! moved, upgraded or deleted, because the queue entry is all that survives
//! until then. The payload is a complete re-invocation: the program (by path,
//! or carried inline), the descriptor as arguments, the fingerprint, and
//! `--run --install --time <expr>` so the next occurrence rearms and backs up.

use crate::config::EmbedMode;
use crate::context::Context;
use crate::executor::BackupJob;
use crate::fingerprint::Fingerprint;
use crate::queue::payload::{self, EntryPoint, IDENTIFIER_FLAG};
use crate::queue::{QueueBackend, Submission};
use crate::utils::errors::Result;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// The logical recurring job a user manages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceDescriptor {
    pub queue: String,
    /// Canonical source file
    pub source: PathBuf,
    /// Canonical destination directory
    pub destination: PathBuf,
    /// Recurrence expression, exactly as the user typed it
    pub schedule: String,
    pub keep_revisions: u32,
}

impl RecurrenceDescriptor {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(&self.queue)
            .with_paths(&self.source, &self.destination)
            .with_schedule(&self.schedule)
    }

    pub fn backup_job(&self) -> BackupJob {
        BackupJob {
            source: self.source.clone(),
            destination: self.destination.clone(),
            keep_revisions: self.keep_revisions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Scheduled(Submission),
    /// `--noop`: the payload that would have been submitted
    DryRun { payload: String },
}

pub struct Installer<'a, Q: QueueBackend + ?Sized> {
    ctx: &'a Context,
    queue: &'a Q,
    program: Option<PathBuf>,
}

impl<'a, Q: QueueBackend + ?Sized> Installer<'a, Q> {
    pub fn new(ctx: &'a Context, queue: &'a Q) -> Self {
        Self {
            ctx,
            queue,
            program: ctx.config.install.program.clone(),
        }
    }

    /// Use `program` as the binary scheduled jobs run.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    fn program(&self) -> Result<PathBuf> {
        match &self.program {
            Some(program) => Ok(program.clone()),
            None => Ok(std::fs::canonicalize(std::env::current_exe()?)?),
        }
    }

    /// Arguments the next occurrence is started with.
    pub fn relay_args(&self, descriptor: &RecurrenceDescriptor, identifier: &str) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(config) = &self.ctx.config_path {
            args.push("--config".to_string());
            args.push(config.to_string_lossy().into_owned());
        }
        args.extend([
            "--sourcefile".to_string(),
            descriptor.source.to_string_lossy().into_owned(),
            "--destinationdirectory".to_string(),
            descriptor.destination.to_string_lossy().into_owned(),
            "--keeprevisions".to_string(),
            descriptor.keep_revisions.to_string(),
            IDENTIFIER_FLAG.to_string(),
            identifier.to_string(),
            "--run".to_string(),
            "--install".to_string(),
            "--time".to_string(),
            descriptor.schedule.clone(),
        ]);
        args
    }

    /// Assemble the payload for the next occurrence of `descriptor`.
    pub fn build_payload(&self, descriptor: &RecurrenceDescriptor, identifier: &str) -> Result<String> {
        let args = self.relay_args(descriptor, identifier);
        let program = self.program()?;

        let inline = match self.ctx.config.install.embed {
            EmbedMode::Inline => true,
            EmbedMode::Path => false,
            EmbedMode::Auto => is_transient(&program),
        };

        if inline {
            debug!(program = %program.display(), "Embedding program in payload");
            let encoded = self.ctx.embedded_program(&program)?;
            Ok(payload::assemble(EntryPoint::Inline { encoded }, &args))
        } else {
            Ok(payload::assemble(EntryPoint::Path(&program), &args))
        }
    }

    /// Schedule the next occurrence of `descriptor`.
    ///
    /// `identifier` is the fingerprint handed down by the previous occurrence;
    /// it is carried forward unchanged so the whole chain stays matchable.
    pub fn install(
        &self,
        descriptor: &RecurrenceDescriptor,
        identifier: Option<&str>,
    ) -> Result<InstallOutcome> {
        let computed = descriptor.fingerprint().into_string();
        let identifier = match identifier {
            Some(inherited) => {
                if inherited != computed {
                    warn!(
                        inherited,
                        computed = %computed,
                        "Inherited identifier differs from the recomputed one; keeping the inherited one"
                    );
                }
                inherited.to_string()
            }
            None => computed,
        };

        let payload = self.build_payload(descriptor, &identifier)?;
        debug!(
            queue = self.queue.queue_name(),
            when = %descriptor.schedule,
            "Scheduling payload:\n{}",
            payload::display_command(&payload)
        );

        if self.ctx.noop {
            return Ok(InstallOutcome::DryRun { payload });
        }

        let submission = self.queue.submit(&payload, &descriptor.schedule)?;
        info!(
            id = submission.id,
            at = %submission.resolved_time,
            source = %descriptor.source.display(),
            "Backup job scheduled"
        );
        Ok(InstallOutcome::Scheduled(submission))
    }
}

/// A program the next occurrence may not find again: anything under the
/// temp directory or inside a cargo build directory.
fn is_transient(program: &Path) -> bool {
    let temp = std::fs::canonicalize(std::env::temp_dir()).unwrap_or_else(|_| std::env::temp_dir());
    if program.starts_with(&temp) {
        return true;
    }
    let names: Vec<&std::ffi::OsStr> = program
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name),
            _ => None,
        })
        .collect();
    names
        .windows(2)
        .any(|pair| pair[0] == "target" && (pair[1] == "debug" || pair[1] == "release"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::queue::memory::MemoryQueue;
    use crate::utils::errors::TinyBackupError;
    use base64::Engine;
    use std::io::Write;

    fn descriptor() -> RecurrenceDescriptor {
        RecurrenceDescriptor {
            queue: "z".to_string(),
            source: PathBuf::from("/tmp/a.log"),
            destination: PathBuf::from("/tmp/my backups"),
            schedule: "now + 1 minute".to_string(),
            keep_revisions: 5,
        }
    }

    fn ctx_with(embed: EmbedMode, noop: bool) -> Context {
        let mut config = Config::default();
        config.install.embed = embed;
        Context::new(config, None, false, noop)
    }

    #[test]
    fn test_relay_args_shape() {
        let ctx = ctx_with(EmbedMode::Path, false);
        let queue = MemoryQueue::new("z");
        let installer = Installer::new(&ctx, &queue);

        let args = installer.relay_args(&descriptor(), "id_1_2");
        assert_eq!(
            args,
            vec![
                "--sourcefile",
                "/tmp/a.log",
                "--destinationdirectory",
                "/tmp/my backups",
                "--keeprevisions",
                "5",
                "--identifier",
                "id_1_2",
                "--run",
                "--install",
                "--time",
                "now + 1 minute",
            ]
        );
    }

    #[test]
    fn test_relay_args_carry_config() {
        let ctx = Context::new(
            Config::default(),
            Some(PathBuf::from("/etc/tinybackup.toml")),
            false,
            false,
        );
        let queue = MemoryQueue::new("z");
        let args = Installer::new(&ctx, &queue).relay_args(&descriptor(), "x");
        assert_eq!(&args[..2], &["--config", "/etc/tinybackup.toml"]);
    }

    #[test]
    fn test_install_submits_tagged_payload() {
        let ctx = ctx_with(EmbedMode::Path, false);
        let queue = MemoryQueue::new("z");
        let installer = Installer::new(&ctx, &queue).with_program("/usr/local/bin/tinybackup");

        let outcome = installer.install(&descriptor(), None).unwrap();
        let InstallOutcome::Scheduled(submission) = outcome else {
            panic!("expected a submission");
        };
        assert_eq!(submission.resolved_time, "<now + 1 minute>");

        let stored = queue.payload(submission.id).unwrap();
        let fingerprint = descriptor().fingerprint().into_string();
        assert!(stored.starts_with("/usr/local/bin/tinybackup --sourcefile /tmp/a.log"));
        assert!(stored.contains(&format!("--identifier {}", fingerprint)));
        assert!(stored.contains("'/tmp/my backups'"));
        assert!(stored.contains("--run --install --time 'now + 1 minute'"));
    }

    #[test]
    fn test_install_keeps_inherited_identifier() {
        let ctx = ctx_with(EmbedMode::Path, false);
        let queue = MemoryQueue::new("z");
        let installer = Installer::new(&ctx, &queue).with_program("/bin/tinybackup");

        installer.install(&descriptor(), Some("inherited_token_value")).unwrap();
        let stored = queue.payload(queue.ids()[0]).unwrap();
        assert!(stored.contains("--identifier inherited_token_value"));
    }

    #[test]
    fn test_rejected_schedule_surfaces_backend_message() {
        let ctx = ctx_with(EmbedMode::Path, false);
        let queue = MemoryQueue::new("z").rejecting("now + 1 minute");
        let installer = Installer::new(&ctx, &queue).with_program("/bin/tinybackup");

        let err = installer.install(&descriptor(), None).unwrap_err();
        assert!(matches!(err, TinyBackupError::SubmissionRejected(_)));
        assert!(err.to_string().contains("Last token seen: now + 1 minute"));
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_noop_submits_nothing() {
        let ctx = ctx_with(EmbedMode::Path, true);
        let queue = MemoryQueue::new("z");
        let installer = Installer::new(&ctx, &queue).with_program("/bin/tinybackup");

        let outcome = installer.install(&descriptor(), None).unwrap();
        assert!(matches!(outcome, InstallOutcome::DryRun { ref payload } if payload.contains("--run")));
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_inline_payload_embeds_program_once() {
        let mut program = tempfile::NamedTempFile::new().unwrap();
        program.write_all(b"\x7fELF fake binary").unwrap();
        program.flush().unwrap();

        let ctx = ctx_with(EmbedMode::Inline, false);
        let queue = MemoryQueue::new("z");
        let installer = Installer::new(&ctx, &queue).with_program(program.path());

        installer.install(&descriptor(), None).unwrap();
        installer.install(&descriptor(), None).unwrap();

        let encoded = base64::engine::general_purpose::STANDARD.encode(b"\x7fELF fake binary");
        for id in queue.ids() {
            let stored = queue.payload(id).unwrap();
            assert!(stored.contains(&encoded));
            assert!(stored.contains("\"$tinybackup_dir/tinybackup\" --sourcefile /tmp/a.log"));
            assert!(!stored.contains(&program.path().to_string_lossy().into_owned()));
        }
    }

    #[test]
    fn test_transient_locations() {
        assert!(is_transient(Path::new("/home/me/proj/target/debug/tinybackup")));
        assert!(is_transient(Path::new("/home/me/proj/target/release/deps/tinybackup-1a2b")));
        assert!(is_transient(&std::fs::canonicalize(std::env::temp_dir()).unwrap().join("tb")));
        assert!(!is_transient(Path::new("/usr/local/bin/tinybackup")));
        assert!(!is_transient(Path::new("/opt/target/tinybackup")));
    }
}
