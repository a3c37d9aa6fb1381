//! Hierarchical job fingerprints.
//!
//! One SHA-256 accumulator is seeded with the queue name, then fed the
//! source and destination paths, then the recurrence expression. After each
//! round the running digest is snapshotted and truncated to 128 bits; the
//! snapshots are joined with `_`. A level-k identifier is therefore always a
//! prefix of the level-(k+1) identifier built from the same inputs, which
//! lets one string serve as a search token at three specificities.

use sha2::{Digest, Sha256};
use std::fmt;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Bytes of each digest snapshot kept in the identifier (128 bits).
const LEVEL_DIGEST_BYTES: usize = 16;

const LEVEL_SEPARATOR: char = '_';

/// How specific a fingerprint (and therefore a job filter) is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FilterLevel {
    /// Every job this tool installed in the queue
    All = 1,
    /// Jobs for one source/destination pair
    Files = 2,
    /// Jobs for one source/destination pair and recurrence expression
    Exact = 3,
}

impl FilterLevel {
    pub const LEVELS: [FilterLevel; 3] = [FilterLevel::All, FilterLevel::Files, FilterLevel::Exact];

    /// Accepted spellings; the first one is the descriptive name.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            FilterLevel::All => &["all backup jobs", "all"],
            FilterLevel::Files => &["jobs with this source and destination", "files"],
            FilterLevel::Exact => &[
                "jobs exactly like this one",
                "this",
                "thisjob",
                "time",
                "bytime",
            ],
        }
    }

    pub fn description(self) -> &'static str {
        self.keywords()[0]
    }

    pub fn needs_paths(self) -> bool {
        self >= FilterLevel::Files
    }

    pub fn needs_time(self) -> bool {
        self == FilterLevel::Exact
    }

    /// Parse a filter keyword. The error lists every keyword grouped by level.
    pub fn parse_keyword(value: &str) -> Result<FilterLevel, String> {
        Self::LEVELS
            .into_iter()
            .find(|level| level.keywords().contains(&value))
            .ok_or_else(|| {
                let mut msg = format!("'{}' is not a valid filter. Valid values and their roles are:\n", value);
                for level in Self::LEVELS {
                    let quoted: Vec<String> =
                        level.keywords().iter().map(|k| format!("\"{}\"", k)).collect();
                    msg.push_str(&format!("\t{}: {}\n", level.description(), quoted.join(", ")));
                }
                msg
            })
    }
}

impl fmt::Display for FilterLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Incrementally built fingerprint.
#[derive(Clone)]
pub struct Fingerprint {
    hasher: Sha256,
    identifier: String,
    level: FilterLevel,
}

impl Fingerprint {
    /// Level 1: the queue alone.
    pub fn new(queue: &str) -> Self {
        let mut fingerprint = Self {
            hasher: Sha256::new(),
            identifier: String::new(),
            level: FilterLevel::All,
        };
        fingerprint.hasher.update(queue.as_bytes());
        fingerprint.snapshot();
        fingerprint
    }

    /// Level 2: add the source and destination paths (expected canonical).
    pub fn with_paths(mut self, source: &Path, destination: &Path) -> Self {
        // NUL cannot occur in a path, so it keeps the two paths apart.
        self.hasher.update(source.as_os_str().as_bytes());
        self.hasher.update([0u8]);
        self.hasher.update(destination.as_os_str().as_bytes());
        self.hasher.update([0u8]);
        self.level = FilterLevel::Files;
        self.snapshot();
        self
    }

    /// Level 3: add the literal recurrence expression.
    pub fn with_schedule(mut self, expression: &str) -> Self {
        self.hasher.update(expression.as_bytes());
        self.level = FilterLevel::Exact;
        self.snapshot();
        self
    }

    fn snapshot(&mut self) {
        let digest = self.hasher.clone().finalize();
        if !self.identifier.is_empty() {
            self.identifier.push(LEVEL_SEPARATOR);
        }
        self.identifier.push_str(&hex::encode(&digest[..LEVEL_DIGEST_BYTES]));
    }

    pub fn level(&self) -> FilterLevel {
        self.level
    }

    pub fn as_str(&self) -> &str {
        &self.identifier
    }

    pub fn into_string(self) -> String {
        self.identifier
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}

/// Fingerprint of `level` for one queue/source/destination/expression tuple.
pub fn fingerprint(
    queue: &str,
    source: &Path,
    destination: &Path,
    expression: &str,
    level: FilterLevel,
) -> String {
    let mut fp = Fingerprint::new(queue);
    if level >= FilterLevel::Files {
        fp = fp.with_paths(source, destination);
    }
    if level >= FilterLevel::Exact {
        fp = fp.with_schedule(expression);
    }
    fp.into_string()
}

/// Whether `token` has the shape of a full (three-level) identifier.
pub fn is_full_identifier(token: &str) -> bool {
    let parts: Vec<&str> = token.split(LEVEL_SEPARATOR).collect();
    parts.len() == 3
        && parts.iter().all(|p| {
            p.len() == LEVEL_DIGEST_BYTES * 2 && p.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        })
}
