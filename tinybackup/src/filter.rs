//! Finding and acting on installed jobs.
//!
//! Jobs are matched by literal containment of a fingerprint in their stored
//! payload. The fingerprint level picks the scope: the whole queue, one
//! source/destination pair, or one exact recurrence definition.

use crate::context::Context;
use crate::fingerprint::{FilterLevel, Fingerprint};
use crate::queue::payload;
use crate::queue::{QueueBackend, QueueEntry};
use crate::utils::errors::{Result, TinyBackupError};
use std::path::Path;
use tracing::{debug, info, warn};

/// Search token for `level`. Paths must already be canonical.
pub fn search_token(
    queue: &str,
    level: FilterLevel,
    paths: Option<(&Path, &Path)>,
    schedule: Option<&str>,
) -> Result<String> {
    let mut fingerprint = Fingerprint::new(queue);
    if level.needs_paths() {
        let (source, destination) = paths.ok_or_else(|| {
            TinyBackupError::InvalidInput(format!(
                "--sourcefile and --destinationdirectory are required to match '{}'",
                level
            ))
        })?;
        fingerprint = fingerprint.with_paths(source, destination);
    }
    if level.needs_time() {
        let schedule = schedule.ok_or_else(|| {
            TinyBackupError::InvalidInput(format!("--time is required to match '{}'", level))
        })?;
        fingerprint = fingerprint.with_schedule(schedule);
    }
    Ok(fingerprint.into_string())
}

/// A queue entry whose payload contains the search token.
#[derive(Debug, Clone)]
pub struct MatchedJob {
    pub entry: QueueEntry,
    pub payload: String,
}

impl MatchedJob {
    /// The scheduled command, minus the identifier bookkeeping.
    pub fn display_command(&self) -> String {
        payload::display_command(&self.payload)
    }
}

/// Matching jobs, plus the ids whose payload could not be read.
#[derive(Debug, Clone, Default)]
pub struct JobMatches {
    pub jobs: Vec<MatchedJob>,
    pub unreadable: Vec<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct RemovalReport {
    pub removed: Vec<QueueEntry>,
    pub failed: Vec<QueueEntry>,
    pub unreadable: Vec<u64>,
    /// Nothing was cancelled; `removed` lists what would have been.
    pub dry_run: bool,
}

impl RemovalReport {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.failed.is_empty() && self.unreadable.is_empty()
    }
}

pub struct JobFilter<'a, Q: QueueBackend + ?Sized> {
    ctx: &'a Context,
    queue: &'a Q,
}

impl<'a, Q: QueueBackend + ?Sized> JobFilter<'a, Q> {
    pub fn new(ctx: &'a Context, queue: &'a Q) -> Self {
        Self { ctx, queue }
    }

    /// Every entry in the queue whose payload contains `token`.
    pub fn matching(&self, token: &str) -> Result<JobMatches> {
        let listing = self.queue.list()?;
        let mut matches = JobMatches::default();
        for entry in listing.entries() {
            // The job may have run or been removed since the listing.
            let stored = match self.queue.inspect(entry.id) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!(id = entry.id, error = %e, "Skipping job that could not be inspected");
                    matches.unreadable.push(entry.id);
                    continue;
                }
            };
            if payload::contains_token(&stored, token) {
                debug!(id = entry.id, "Job matches");
                matches.jobs.push(MatchedJob {
                    entry,
                    payload: stored,
                });
            }
        }
        Ok(matches)
    }

    /// Cancel every matching job. A failed cancel is recorded and the rest
    /// are still attempted.
    pub fn uninstall(&self, token: &str) -> Result<RemovalReport> {
        let matches = self.matching(token)?;
        let mut report = RemovalReport {
            unreadable: matches.unreadable,
            dry_run: self.ctx.noop,
            ..RemovalReport::default()
        };
        for job in matches.jobs {
            if self.ctx.noop {
                report.removed.push(job.entry);
                continue;
            }
            match self.queue.cancel(job.entry.id) {
                Ok(()) => {
                    info!(id = job.entry.id, schedule = %job.entry.schedule, "Removed job");
                    report.removed.push(job.entry);
                }
                Err(e) => {
                    warn!(id = job.entry.id, error = %e, "Failed to remove job");
                    report.failed.push(job.entry);
                }
            }
        }
        Ok(report)
    }

    pub fn status(&self, token: &str) -> Result<JobMatches> {
        self.matching(token)
    }
}

/// Guidance printed when a filter matched nothing.
pub fn no_match_hints(program: &str, queue: &str) -> String {
    format!(
        "Use '{program} --uninstall all' to remove all backup jobs from queue '{queue}'\n\
         Use 'at -l -q {queue} | cut -f1 | xargs at -r' to remove all jobs from queue '{queue}'\n\
         Use 'at -l | cut -f1 | xargs at -r' to remove all scheduled jobs of any kind from this system\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::queue::memory::MemoryQueue;

    fn token(level: FilterLevel, dst: &str, schedule: &str) -> String {
        search_token(
            "z",
            level,
            Some((Path::new("/tmp/a.log"), Path::new(dst))),
            Some(schedule),
        )
        .unwrap()
    }

    fn seed(queue: &MemoryQueue, dst: &str, schedule: &str) -> u64 {
        let payload = format!(
            "/bin/tinybackup --sourcefile /tmp/a.log --identifier {} --run\n",
            token(FilterLevel::Exact, dst, schedule)
        );
        queue.submit(&payload, schedule).unwrap().id
    }

    fn ctx(noop: bool) -> Context {
        Context::new(Config::default(), None, false, noop)
    }

    #[test]
    fn test_search_token_requires_inputs() {
        assert!(search_token("z", FilterLevel::All, None, None).is_ok());
        let err = search_token("z", FilterLevel::Files, None, None).unwrap_err();
        assert!(matches!(err, TinyBackupError::InvalidInput(_)));
        let err = search_token(
            "z",
            FilterLevel::Exact,
            Some((Path::new("/a"), Path::new("/b"))),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("--time"));
    }

    #[test]
    fn test_levels_scope_matches() {
        let queue = MemoryQueue::new("z");
        let ctx = ctx(false);
        seed(&queue, "/tmp/one", "midnight");
        seed(&queue, "/tmp/one", "noon");
        seed(&queue, "/tmp/two", "midnight");
        queue.submit("echo unrelated\n", "teatime").unwrap();

        let filter = JobFilter::new(&ctx, &queue);
        assert_eq!(filter.matching(&token(FilterLevel::All, "/tmp/one", "midnight")).unwrap().jobs.len(), 3);
        assert_eq!(filter.matching(&token(FilterLevel::Files, "/tmp/one", "midnight")).unwrap().jobs.len(), 2);
        assert_eq!(filter.matching(&token(FilterLevel::Exact, "/tmp/one", "midnight")).unwrap().jobs.len(), 1);
    }

    #[test]
    fn test_uninstall_by_pair_leaves_other_pair() {
        let queue = MemoryQueue::new("z");
        let ctx = ctx(false);
        let one = seed(&queue, "/tmp/one", "midnight");
        let two = seed(&queue, "/tmp/two", "midnight");

        let filter = JobFilter::new(&ctx, &queue);
        let report = filter.uninstall(&token(FilterLevel::Files, "/tmp/one", "midnight")).unwrap();
        assert_eq!(report.removed.iter().map(|e| e.id).collect::<Vec<_>>(), vec![one]);
        assert!(report.failed.is_empty());
        assert_eq!(queue.ids(), vec![two]);
    }

    #[test]
    fn test_failed_cancel_does_not_stop_the_rest() {
        let queue = MemoryQueue::new("z");
        let ctx = ctx(false);
        let first = seed(&queue, "/tmp/one", "midnight");
        let second = seed(&queue, "/tmp/one", "noon");
        queue.stick(first);

        let report = JobFilter::new(&ctx, &queue)
            .uninstall(&token(FilterLevel::Files, "/tmp/one", "x"))
            .unwrap();
        assert_eq!(report.failed.iter().map(|e| e.id).collect::<Vec<_>>(), vec![first]);
        assert_eq!(report.removed.iter().map(|e| e.id).collect::<Vec<_>>(), vec![second]);
        assert_eq!(queue.ids(), vec![first]);
    }

    #[test]
    fn test_noop_uninstall_keeps_jobs() {
        let queue = MemoryQueue::new("z");
        let ctx = ctx(true);
        seed(&queue, "/tmp/one", "midnight");

        let report = JobFilter::new(&ctx, &queue)
            .uninstall(&token(FilterLevel::All, "/tmp/one", "midnight"))
            .unwrap();
        assert!(report.dry_run);
        assert_eq!(report.removed.len(), 1);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_status_hides_identifier() {
        let queue = MemoryQueue::new("z");
        let ctx = ctx(false);
        seed(&queue, "/tmp/one", "midnight");

        let jobs = JobFilter::new(&ctx, &queue)
            .status(&token(FilterLevel::Exact, "/tmp/one", "midnight"))
            .unwrap()
            .jobs;
        assert_eq!(jobs.len(), 1);
        assert_eq!(
            jobs[0].display_command(),
            "/bin/tinybackup --sourcefile /tmp/a.log --run"
        );
        assert!(jobs[0].entry.schedule.contains("midnight"));
    }

    #[test]
    fn test_unreadable_jobs_are_reported() {
        let queue = MemoryQueue::new("z");
        let ctx = ctx(false);
        let hidden = seed(&queue, "/tmp/one", "midnight");
        let visible = seed(&queue, "/tmp/one", "noon");
        queue.blind(hidden);

        let report = JobFilter::new(&ctx, &queue)
            .uninstall(&token(FilterLevel::All, "/tmp/one", "midnight"))
            .unwrap();
        assert_eq!(report.removed.iter().map(|e| e.id).collect::<Vec<_>>(), vec![visible]);
        assert_eq!(report.unreadable, vec![hidden]);
        assert!(!report.is_empty());
        assert_eq!(queue.ids(), vec![hidden]);
    }

    #[test]
    fn test_hints_mention_queue() {
        let hints = no_match_hints("tinybackup", "z");
        assert!(hints.contains("tinybackup --uninstall all"));
        assert!(hints.contains("at -l -q z"));
        assert_eq!(hints.lines().count(), 3);
    }
}
