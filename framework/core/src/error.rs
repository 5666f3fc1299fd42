use std::time::Duration;

/// A malformed workload declaration. Fatal at load time, the run never starts.
#[derive(derive_more::Error, derive_more::Display, Debug, Clone, PartialEq)]
pub enum DeclarationError {
    #[display("stage {index}: duration `{value}` could not be parsed: {reason}")]
    UnparsableDuration {
        index: usize,
        value: String,
        reason: String,
    },
    #[display("stage {index}: duration `{value}` is negative")]
    NegativeDuration { index: usize, value: String },
    #[display("stage {index}: target {target} is negative")]
    NegativeTarget { index: usize, target: i64 },
    #[display("stage {index}: duration `{value}` makes the ramp too long")]
    RampTooLong { index: usize, value: String },
    #[display("stage `{value}` is not in the form DURATION:TARGET")]
    MalformedStage { value: String },
    #[display("connection string `{value}` is not a valid URL: {reason}")]
    InvalidConnectionString { value: String, reason: String },
    #[display("no iteration function was declared for scenario `{scenario}`")]
    MissingIteration { scenario: String },
    #[display("declaration file `{path}` could not be loaded: {reason}")]
    InvalidFile { path: String, reason: String },
}

/// An internal inconsistency in the scheduler. Fatal, aborts the run.
#[derive(derive_more::Error, derive_more::Display, Debug, Clone)]
pub enum SchedulerFault {
    #[display("computed target concurrency {target} at {elapsed:?} is not a valid population")]
    InvalidTarget { target: f64, elapsed: Duration },
    #[display("failed to spawn thread for virtual user {vu_id}: {reason}")]
    SpawnFailed { vu_id: String, reason: String },
}

/// A failure of the network call made by an iteration.
///
/// This never terminates a virtual user or the run. It is carried in the iteration outcome and
/// counted by the reporter.
#[derive(derive_more::Error, derive_more::Display, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[display("request timed out")]
    Timeout,
    /// Connection refused, unreachable host or failed name resolution.
    #[display("connection failed: {reason}")]
    Connect { reason: String },
    /// The run was stopped while the request was in flight.
    #[display("request cancelled by shutdown")]
    Cancelled,
    #[display("request failed: {reason}")]
    Other { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_error_names_the_stage() {
        let err = DeclarationError::NegativeTarget {
            index: 2,
            target: -5,
        };

        assert_eq!("stage 2: target -5 is negative", err.to_string());
    }

    #[test]
    fn scheduler_fault_describes_the_invariant() {
        let err = SchedulerFault::InvalidTarget {
            target: -1.0,
            elapsed: Duration::from_secs(3),
        };

        assert_eq!(
            "computed target concurrency -1 at 3s is not a valid population",
            err.to_string()
        );
    }
}
