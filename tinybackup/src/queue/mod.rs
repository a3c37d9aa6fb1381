//! One-shot job queue backends.
//!
//! The queue is the only durable store tinybackup has. [`QueueBackend`] is
//! the narrow capability the rest of the crate uses: submit, list, inspect,
//! cancel. [`at::AtQueue`] drives at(1).

pub mod at;
#[cfg(test)]
pub mod memory;
pub mod payload;

use crate::utils::errors::{Result, TinyBackupError};

/// Confirmation of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub id: u64,
    /// Absolute due time as the backend printed it
    pub resolved_time: String,
}

/// One row of a queue listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub id: u64,
    pub schedule: String,
}

/// Snapshot of a queue listing, parsed lazily. Iterate as often as needed.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    raw: String,
}

impl Listing {
    /// Wrap newline-delimited `id schedule...` rows.
    pub fn new(raw: String) -> Self {
        Self { raw }
    }

    pub fn entries(&self) -> impl Iterator<Item = QueueEntry> + '_ {
        self.raw.lines().filter_map(parse_listing_row)
    }
}

fn parse_listing_row(line: &str) -> Option<QueueEntry> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (id, schedule) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    match id.parse() {
        Ok(id) => Some(QueueEntry {
            id,
            schedule: schedule.trim().to_string(),
        }),
        Err(_) => {
            tracing::warn!(row = line, "Skipping unparseable queue listing row");
            None
        }
    }
}

pub trait QueueBackend {
    /// Queue every operation is confined to.
    fn queue_name(&self) -> &str;

    /// Check the backend can be invoked at all.
    fn verify(&self) -> Result<()>;

    /// Schedule `payload` to run at `when`.
    fn submit(&self, payload: &str, when: &str) -> Result<Submission>;

    fn list(&self) -> Result<Listing>;

    /// Full stored payload of one entry.
    fn inspect(&self, id: u64) -> Result<String>;

    /// Remove one entry. Failure carries no detail beyond the id.
    fn cancel(&self, id: u64) -> Result<()>;
}

/// Check that the backend understands `expression` by scheduling a no-op at
/// that time and removing it again. Returns the resolved due time.
pub fn validate_schedule<Q: QueueBackend + ?Sized>(queue: &Q, expression: &str) -> Result<String> {
    let probe = queue.submit("true\n", expression).map_err(|e| match e {
        TinyBackupError::SubmissionRejected(msg) => TinyBackupError::InvalidInput(format!(
            "invalid --time '{}': {}",
            expression, msg
        )),
        TinyBackupError::SubmissionUnconfirmed { output } => TinyBackupError::InvalidInput(format!(
            "could not confirm --time '{}': {}",
            expression, output
        )),
        other => other,
    })?;
    queue.cancel(probe.id)?;
    tracing::debug!(expression, resolved = %probe.resolved_time, "Time expression validated");
    Ok(probe.resolved_time)
}
