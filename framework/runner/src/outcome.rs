use surge_core::prelude::TransportError;
use surge_instruments::CheckResult;

use crate::check::{check, Check};
use crate::http::HttpResult;

/// What one iteration produced. Consumed by the reporter as soon as the iteration returns.
#[derive(Debug, Clone)]
pub struct IterationOutcome {
    pub response: HttpResult,
    pub checks: Vec<CheckResult>,
}

impl IterationOutcome {
    pub fn new(response: HttpResult, checks: Vec<CheckResult>) -> Self {
        Self { response, checks }
    }

    /// Evaluate `checks` against `response` and keep both.
    pub fn checked(response: HttpResult, checks: &[Check<HttpResult>]) -> Self {
        let checks = check(&response, checks);
        Self { response, checks }
    }

    /// The iteration's request was cancelled because the run is shutting down.
    pub fn is_interrupted(&self) -> bool {
        matches!(self.response, Err(TransportError::Cancelled))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::http::{status_was, HttpResponse};

    #[test]
    fn checked_outcome_keeps_response_and_results() {
        let outcome = IterationOutcome::checked(
            Ok(HttpResponse::new(200, "", Duration::from_millis(1))),
            &[status_was("status was 200", 200)],
        );

        assert!(!outcome.is_interrupted());
        assert_eq!(1, outcome.checks.len());
        assert!(outcome.checks[0].passed);
    }

    #[test]
    fn cancelled_request_is_interrupted() {
        let outcome = IterationOutcome::checked(
            Err(TransportError::Cancelled),
            &[status_was("status was 200", 200)],
        );

        assert!(outcome.is_interrupted());
        assert!(!outcome.checks[0].passed);
    }
}
