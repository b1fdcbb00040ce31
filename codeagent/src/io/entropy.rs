//! OS-backed entropy and wall-clock sources for task ids.

use chrono::{Local, NaiveDate};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::core::task_id::{Clock, EntropyError, EntropySource};

/// Cryptographically strong bytes from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<(), EntropyError> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|err| EntropyError::new(err.to_string()))
    }
}

/// Today's date in the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}
