//! Custom error types for tinybackup.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TinyBackupError {
    #[error("Could not invoke '{binary}'; tinybackup cannot function: {reason}")]
    DependencyUnavailable { binary: String, reason: String },

    #[error("{0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The backend refused the job; carries its own message verbatim.
    #[error("{0}")]
    SubmissionRejected(String),

    #[error("Couldn't get job info after successful submission: {output}")]
    SubmissionUnconfirmed { output: String },

    #[error("Failed to remove job {0}")]
    CancelFailed(u64),

    #[error("Failed to remove {} job(s): {}", .0.len(), join_ids(.0))]
    PartialRemoval(Vec<u64>),

    #[error("Could not inspect {} job(s): {}", .0.len(), join_ids(.0))]
    Uninspectable(Vec<u64>),

    #[error("No matching jobs found")]
    NoMatches,

    #[error("Queue backend error: {0}")]
    Backend(String),

    #[error("Backup failed: {0}")]
    BackupFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TinyBackupError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            TinyBackupError::NoMatches => 1,
            TinyBackupError::InvalidInput(_) | TinyBackupError::Config(_) => 2,
            _ => 3,
        }
    }
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, TinyBackupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(TinyBackupError::NoMatches.exit_code(), 1);
        assert_eq!(TinyBackupError::InvalidInput("x".into()).exit_code(), 2);
        assert_eq!(TinyBackupError::CancelFailed(4).exit_code(), 3);
        assert_eq!(
            TinyBackupError::DependencyUnavailable {
                binary: "at".into(),
                reason: "not found".into(),
            }
            .exit_code(),
            3
        );
    }

    #[test]
    fn test_rejection_message_is_verbatim() {
        let err = TinyBackupError::SubmissionRejected("syntax error. Last token seen: bogus".into());
        assert_eq!(err.to_string(), "syntax error. Last token seen: bogus");
    }

    #[test]
    fn test_partial_removal_lists_ids() {
        let err = TinyBackupError::PartialRemoval(vec![3, 7]);
        assert_eq!(err.to_string(), "Failed to remove 2 job(s): 3, 7");
    }
}
