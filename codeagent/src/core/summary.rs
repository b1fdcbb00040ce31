//! Summary computation for the structured output payload.

use serde::Serialize;

use crate::core::types::TaskResult;

/// Aggregate counts over a list of results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutputSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

/// Serialized shape of the output file.
#[derive(Debug, Serialize)]
pub struct OutputPayload<'a> {
    pub results: &'a [TaskResult],
    pub summary: OutputSummary,
}

impl<'a> OutputPayload<'a> {
    pub fn new(results: &'a [TaskResult]) -> Self {
        Self {
            results,
            summary: summarize_results(results),
        }
    }
}

pub fn summarize_results(results: &[TaskResult]) -> OutputSummary {
    let success = results.iter().filter(|res| res.is_success()).count();
    OutputSummary {
        total: results.len(),
        success,
        failed: results.len() - success,
    }
}
