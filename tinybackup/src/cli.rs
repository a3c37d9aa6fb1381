//! Command-line surface and argument validation.

use crate::fingerprint::{self, FilterLevel};
use crate::fs;
use crate::installer::RecurrenceDescriptor;
use crate::utils::errors::{Result, TinyBackupError};
use clap::Parser;
use std::path::{Path, PathBuf};

/// Schedule a repeated backup of a single file.
#[derive(Parser, Debug, Clone)]
#[command(name = "tinybackup", author, version, long_about = None)]
pub struct Args {
    /// Schedule this backup to repeat at --time
    #[arg(short = 'i', long, conflicts_with_all = ["uninstall", "statusof"])]
    pub install: bool,

    /// Remove scheduled backups matching FILTER
    #[arg(
        short = 'u',
        long,
        value_name = "FILTER",
        value_parser = FilterLevel::parse_keyword,
        conflicts_with_all = ["statusof", "run"]
    )]
    pub uninstall: Option<FilterLevel>,

    /// Show scheduled backups matching FILTER
    #[arg(
        short = 's',
        long,
        value_name = "FILTER",
        value_parser = FilterLevel::parse_keyword,
        conflicts_with = "run"
    )]
    pub statusof: Option<FilterLevel>,

    /// Run a backup immediately
    #[arg(short = 'r', long)]
    pub run: bool,

    /// at(1) time expression to schedule (or match) backups at
    #[arg(short = 't', long, value_name = "TIMESPEC")]
    pub time: Option<String>,

    /// How many backups of the file to keep [default: 14]
    #[arg(
        short = 'k',
        long,
        value_name = "REVISIONS",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub keeprevisions: Option<u32>,

    /// File to back up
    #[arg(short = 'f', long, value_name = "FILE_PATH")]
    pub sourcefile: Option<PathBuf>,

    /// Directory in which to store backed up files
    #[arg(
        short = 'd',
        long = "destinationdirectory",
        visible_alias = "destdir",
        alias = "destinationdir",
        value_name = "DIRECTORY_PATH"
    )]
    pub destinationdirectory: Option<PathBuf>,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Show what would be done without changing the queue or any files
    #[arg(long)]
    pub noop: bool,

    /// Job fingerprint handed down by the previous occurrence
    #[arg(long, hide = true)]
    pub identifier: Option<String>,

    /// Path to configuration file
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Install,
    Run,
    /// A scheduled occurrence (or a user asking for both): rearm, then back up
    RunAndInstall,
    Uninstall(FilterLevel),
    Status(FilterLevel),
}

impl Action {
    fn installs(self) -> bool {
        matches!(self, Action::Install | Action::RunAndInstall)
    }

    fn runs(self) -> bool {
        matches!(self, Action::Run | Action::RunAndInstall)
    }

    pub fn filter_level(self) -> Option<FilterLevel> {
        match self {
            Action::Uninstall(level) | Action::Status(level) => Some(level),
            _ => None,
        }
    }
}

/// Validated request for one process run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub action: Action,
    /// Canonical (source, destination)
    pub paths: Option<(PathBuf, PathBuf)>,
    pub time: Option<String>,
    pub keep_revisions: u32,
    pub identifier: Option<String>,
}

impl Invocation {
    pub fn descriptor(&self, queue: &str) -> Option<RecurrenceDescriptor> {
        let (source, destination) = self.paths.clone()?;
        Some(RecurrenceDescriptor {
            queue: queue.to_string(),
            source,
            destination,
            schedule: self.time.clone()?,
            keep_revisions: self.keep_revisions,
        })
    }

    pub fn path_refs(&self) -> Option<(&Path, &Path)> {
        self.paths
            .as_ref()
            .map(|(source, destination)| (source.as_path(), destination.as_path()))
    }
}

fn invalid(msg: impl Into<String>) -> TinyBackupError {
    TinyBackupError::InvalidInput(msg.into())
}

impl Args {
    /// Apply the rules clap cannot express and resolve paths against `cwd`.
    pub fn into_invocation(self, default_keep_revisions: u32, cwd: &Path) -> Result<Invocation> {
        let action = match (self.install, self.run, self.uninstall, self.statusof) {
            (_, _, Some(level), _) => Action::Uninstall(level),
            (_, _, _, Some(level)) => Action::Status(level),
            (true, true, _, _) => Action::RunAndInstall,
            (true, false, _, _) => Action::Install,
            (false, true, _, _) => Action::Run,
            (false, false, None, None) => {
                return Err(invalid(
                    "one of --install, --uninstall, --statusof or --run is required",
                ))
            }
        };

        let exact = FilterLevel::Exact.description();
        let time = match self.time {
            Some(time) if time.trim().is_empty() => {
                return Err(invalid("--time must not be empty"));
            }
            other => other,
        };
        match (action, &time) {
            (a, None) if a.installs() => return Err(invalid("--time is required with --install")),
            (Action::Uninstall(level) | Action::Status(level), None) if level.needs_time() => {
                return Err(invalid(format!(
                    "--time is required with --uninstall/--statusof '{}'",
                    exact
                )));
            }
            (Action::Uninstall(level) | Action::Status(level), Some(_)) if !level.needs_time() => {
                return Err(invalid(format!(
                    "--time is useless with --uninstall/--statusof '{}'; it is only used with '{}'",
                    level, exact
                )));
            }
            (Action::Run, Some(_)) => {
                return Err(invalid(format!(
                    "--time can only be combined with --install or --uninstall/--statusof '{}'",
                    exact
                )));
            }
            _ => {}
        }

        if let Some(identifier) = &self.identifier {
            if action.filter_level().is_some() {
                return Err(invalid("--identifier cannot be used with --uninstall or --statusof"));
            }
            if !fingerprint::is_full_identifier(identifier) {
                return Err(invalid(format!("'{}' is not a valid job identifier", identifier)));
            }
        }

        let needs_paths = action.filter_level().map_or(true, FilterLevel::needs_paths);
        let paths = match (self.sourcefile, self.destinationdirectory) {
            (Some(source), Some(destination)) if needs_paths => Some((
                fs::resolve_from(cwd, &source),
                fs::resolve_from(cwd, &destination),
            )),
            (source, destination) if needs_paths => {
                let missing: Vec<&str> = [
                    source.is_none().then_some("--sourcefile"),
                    destination.is_none().then_some("--destinationdirectory"),
                ]
                .into_iter()
                .flatten()
                .collect();
                return Err(invalid(format!("{} required", missing.join(" and "))));
            }
            (source, destination) => {
                if source.is_some() || destination.is_some() {
                    tracing::debug!("Ignoring paths for a queue-wide filter");
                }
                None
            }
        };

        // A chained occurrence must reach the rearm step even if its files
        // vanished; the backup step reports that instead.
        if action.runs() || action.installs() {
            if let (Some((source, destination)), None) = (&paths, &self.identifier) {
                fs::ensure_readable_file(source)?;
                fs::ensure_writable_dir(destination)?;
            }
        }

        Ok(Invocation {
            action,
            paths,
            time,
            keep_revisions: self.keeprevisions.unwrap_or(default_keep_revisions),
            identifier: self.identifier,
        })
    }
}
