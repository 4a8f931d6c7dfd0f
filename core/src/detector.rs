//! Detector trait.
//!
//! RULE: Every scanner implements Detector. `run_full_scan` is the
//! fail-soft boundary: a sub-check failure is logged and recorded on the
//! result, never propagated. A partial compliance report beats no report.

use crate::{
    error::EngineResult,
    issue::{Issue, ScanResult},
    types::DateRange,
};

/// The contract every detector fulfills.
pub trait Detector {
    /// Unique stable name, used as the report key.
    fn name(&self) -> &'static str;

    /// Run every sub-check for one client over one window.
    /// Always returns a well-formed result; failed sub-checks appear as
    /// empty categories with an `errors` entry.
    fn run_full_scan(&self, client_id: &str, range: DateRange) -> ScanResult;
}

/// Run one sub-check into a category, absorbing failure.
pub(crate) fn run_check<F>(result: &mut ScanResult, detector: &str, category: &str, check: F)
where
    F: FnOnce() -> EngineResult<Vec<Issue>>,
{
    match check() {
        Ok(issues) => {
            log::info!(
                "{detector}/{category}: {} issue(s) for client {}",
                issues.len(),
                result.client_id
            );
            result.add_category(category, issues);
        }
        Err(e) => {
            log::error!(
                "{detector}/{category} failed for client {}: {e}",
                result.client_id
            );
            result.add_error(category, e);
        }
    }
}
