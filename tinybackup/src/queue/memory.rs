//! In-memory queue backend for tests.

use super::{Listing, QueueBackend, Submission};
use crate::utils::errors::{Result, TinyBackupError};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone)]
struct MemoryJob {
    schedule: String,
    payload: String,
}

/// Behaves like at(1) for one queue: sequential ids, verbatim payloads.
#[derive(Debug)]
pub struct MemoryQueue {
    name: String,
    jobs: RefCell<BTreeMap<u64, MemoryJob>>,
    next_id: Cell<u64>,
    rejected: Vec<String>,
    stuck: RefCell<HashSet<u64>>,
    blind: RefCell<HashSet<u64>>,
}

impl MemoryQueue {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            jobs: RefCell::new(BTreeMap::new()),
            next_id: Cell::new(1),
            rejected: Vec::new(),
            stuck: RefCell::new(HashSet::new()),
            blind: RefCell::new(HashSet::new()),
        }
    }

    /// Reject submissions at `expression` the way at(1) rejects bad times.
    pub fn rejecting(mut self, expression: &str) -> Self {
        self.rejected.push(expression.to_string());
        self
    }

    /// Make cancelling `id` fail.
    pub fn stick(&self, id: u64) {
        self.stuck.borrow_mut().insert(id);
    }

    /// Make inspecting `id` fail, as `at -c` does without permission.
    pub fn blind(&self, id: u64) {
        self.blind.borrow_mut().insert(id);
    }

    pub fn len(&self) -> usize {
        self.jobs.borrow().len()
    }

    pub fn ids(&self) -> Vec<u64> {
        self.jobs.borrow().keys().copied().collect()
    }

    pub fn payload(&self, id: u64) -> Option<String> {
        self.jobs.borrow().get(&id).map(|job| job.payload.clone())
    }
}

impl QueueBackend for MemoryQueue {
    fn queue_name(&self) -> &str {
        &self.name
    }

    fn verify(&self) -> Result<()> {
        Ok(())
    }

    fn submit(&self, payload: &str, when: &str) -> Result<Submission> {
        if when.trim().is_empty() || self.rejected.iter().any(|r| r == when) {
            return Err(TinyBackupError::SubmissionRejected(format!(
                "syntax error. Last token seen: {}\nGarbled time",
                when
            )));
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let resolved_time = format!("<{}>", when);
        self.jobs.borrow_mut().insert(
            id,
            MemoryJob {
                schedule: format!("{} {} tester", resolved_time, self.name),
                payload: payload.to_string(),
            },
        );
        Ok(Submission { id, resolved_time })
    }

    fn list(&self) -> Result<Listing> {
        let raw = self
            .jobs
            .borrow()
            .iter()
            .map(|(id, job)| format!("{}\t{}\n", id, job.schedule))
            .collect();
        Ok(Listing::new(raw))
    }

    fn inspect(&self, id: u64) -> Result<String> {
        if self.blind.borrow().contains(&id) {
            return Err(TinyBackupError::Backend(format!("Permission denied reading job {}", id)));
        }
        self.jobs
            .borrow()
            .get(&id)
            .map(|job| format!("#!/bin/sh\n# atrun uid=1000 gid=1000\numask 22\n{}", job.payload))
            .ok_or_else(|| TinyBackupError::Backend(format!("Cannot find jobid {}", id)))
    }

    fn cancel(&self, id: u64) -> Result<()> {
        if self.stuck.borrow().contains(&id) {
            return Err(TinyBackupError::CancelFailed(id));
        }
        self.jobs
            .borrow_mut()
            .remove(&id)
            .map(|_| ())
            .ok_or(TinyBackupError::CancelFailed(id))
    }
}
