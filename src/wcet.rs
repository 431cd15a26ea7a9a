// SPDX-License-Identifier: GPL-3.0-or-later

//! WCET classification: turns a raw execution outcome plus timing
//! measurement into the final [`JobStatus`] and error fields. Pulled out as
//! a pure function so property P2 ("execution_time_us > wcet_us implies the
//! job is never reported Completed") is directly unit-testable without a
//! worker thread.

use crate::error::SUCCESS_CODE;
use crate::job::JobStatus;

/// The outcome of actually running a job's function body, before WCET is
/// taken into account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    Success,
    Failed(i32),
}

/// The fields a classification decision produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub status: JobStatus,
    pub error_code: i32,
    pub error_message: &'static str,
}

/// Classify a job's outcome. Timing violations dominate functional success:
/// an execution that ran over budget is never reported `Completed`, even if
/// its function body otherwise succeeded.
pub fn classify(execution_time_us: u32, wcet_us: u32, outcome: ExecOutcome) -> Classification {
    if execution_time_us > wcet_us {
        Classification {
            status: JobStatus::Error,
            error_code: crate::error::HalError::Timeout.code(),
            error_message: "WCET violation",
        }
    } else {
        match outcome {
            ExecOutcome::Success => Classification {
                status: JobStatus::Completed,
                error_code: SUCCESS_CODE,
                error_message: "",
            },
            ExecOutcome::Failed(code) => Classification {
                status: JobStatus::Error,
                error_code: code,
                error_message: "Execution failed",
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn within_budget_and_successful_completes() {
        let c = classify(100, 1_000, ExecOutcome::Success);
        assert_eq!(c.status, JobStatus::Completed);
        assert_eq!(c.error_code, SUCCESS_CODE);
    }

    #[test]
    fn over_budget_is_always_error_even_on_success() {
        let c = classify(2_000, 1_000, ExecOutcome::Success);
        assert_eq!(c.status, JobStatus::Error);
        assert_eq!(c.error_message, "WCET violation");
    }

    #[test]
    fn over_budget_dominates_functional_failure_too() {
        let c = classify(2_000, 1_000, ExecOutcome::Failed(-4));
        assert_eq!(c.status, JobStatus::Error);
        assert_eq!(c.error_message, "WCET violation");
    }

    #[test]
    fn within_budget_but_failed_is_execution_error() {
        let c = classify(10, 1_000, ExecOutcome::Failed(-4));
        assert_eq!(c.status, JobStatus::Error);
        assert_eq!(c.error_message, "Execution failed");
        assert_eq!(c.error_code, -4);
    }

    #[test]
    fn exactly_at_budget_is_not_a_violation() {
        let c = classify(1_000, 1_000, ExecOutcome::Success);
        assert_eq!(c.status, JobStatus::Completed);
    }
}
