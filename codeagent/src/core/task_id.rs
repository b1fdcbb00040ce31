//! Task identifiers of the form `YYYYMMDD-hhhhhh`.
//!
//! Uniqueness is probabilistic: 3 random bytes give 2^24 ids per calendar day.
//! Callers that need uniqueness (the worktree manager) discover collisions
//! through the version-control system, not here.

use std::fmt;

use chrono::NaiveDate;
use thiserror::Error;

/// Number of entropy bytes per id (rendered as 6 hex characters).
pub const ENTROPY_BYTES: usize = 3;

/// The entropy source could not supply enough bytes.
#[derive(Debug, Error)]
#[error("failed to generate random bytes: {reason}")]
pub struct EntropyError {
    reason: String,
}

impl EntropyError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Source of random bytes for task ids.
pub trait EntropySource {
    /// Fill `buf` completely or fail. Implementations must not retry forever.
    fn fill(&self, buf: &mut [u8]) -> Result<(), EntropyError>;
}

/// Source of the calendar day stamped into task ids.
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

/// Unique label for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId {
    date: NaiveDate,
    entropy: [u8; ENTROPY_BYTES],
}

impl TaskId {
    pub fn new(date: NaiveDate, entropy: [u8; ENTROPY_BYTES]) -> Self {
        Self { date, entropy }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.date.format("%Y%m%d"),
            hex::encode(self.entropy)
        )
    }
}

/// Draw a fresh task id. Never retries: an entropy failure is returned as-is.
pub fn generate_task_id<E, C>(entropy: &E, clock: &C) -> Result<TaskId, EntropyError>
where
    E: EntropySource + ?Sized,
    C: Clock + ?Sized,
{
    let mut bytes = [0u8; ENTROPY_BYTES];
    entropy.fill(&mut bytes)?;
    Ok(TaskId::new(clock.today(), bytes))
}
