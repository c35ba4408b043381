//! Correction executor
//!
//! Runs one zone's corrections in order. A failing correction is recorded
//! and the next one still runs. Cancellation is checked before each
//! correction starts.

use super::cancel::Cancellation;
use crate::correction::Correction;
use crate::error::Error;
use tracing::{debug, info, warn};

/// A correction whose action failed
#[derive(Debug)]
pub struct CorrectionFailure {
    /// The correction's full message
    pub message: String,
    /// The wrapped provider error
    pub error: Error,
}

/// Result of running a list of corrections
#[derive(Debug, Default)]
pub struct ExecutionOutcome {
    /// Corrections that succeeded
    pub applied: usize,
    /// Corrections that failed, in execution order
    pub errors: Vec<CorrectionFailure>,
    /// Corrections never started because of cancellation
    pub skipped: usize,
    /// Whether cancellation stopped the run early
    pub cancelled: bool,
}

impl ExecutionOutcome {
    /// Corrections that were started
    pub fn attempted(&self) -> usize {
        self.applied + self.errors.len()
    }

    /// Whether every correction was applied
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty() && !self.cancelled
    }
}

/// Run `corrections` in order
pub async fn execute(corrections: &[Correction], cancellation: &Cancellation) -> ExecutionOutcome {
    execute_observed(corrections, cancellation, |_, _| {}).await
}

/// Run `corrections` in order, reporting each result to `observe`
pub async fn execute_observed<F>(
    corrections: &[Correction],
    cancellation: &Cancellation,
    mut observe: F,
) -> ExecutionOutcome
where
    F: FnMut(&Correction, Option<&Error>),
{
    let mut outcome = ExecutionOutcome::default();

    for (index, correction) in corrections.iter().enumerate() {
        if cancellation.is_cancelled() {
            outcome.cancelled = true;
            outcome.skipped = corrections.len() - index;
            warn!(
                zone = correction.zone(),
                skipped = outcome.skipped,
                "Cancelled, skipping remaining corrections"
            );
            break;
        }

        debug!(zone = correction.zone(), "Running correction: {}", correction.headline());
        match correction.run().await {
            Ok(()) => {
                info!(zone = correction.zone(), "{}", correction.message);
                observe(correction, None);
                outcome.applied += 1;
            }
            Err(error) => {
                warn!(zone = correction.zone(), "Correction failed: {}", error);
                observe(correction, Some(&error));
                outcome.errors.push(CorrectionFailure {
                    message: correction.message.clone(),
                    error,
                });
            }
        }
    }

    outcome
}
