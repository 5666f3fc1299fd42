mod report;

use std::collections::HashMap;
use std::time::{Duration, Instant};

pub use report::{
    CheckTally, InMemoryReporter, ReportCollector, ReportConfig, Reporter, RunTotals,
};

/// Timing for a single instrumented operation, such as one HTTP request.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub operation_id: String,
    started: Instant,
    pub elapsed: Option<Duration>,
    pub is_error: bool,
    pub attr: HashMap<String, String>,
}

impl OperationRecord {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            started: Instant::now(),
            elapsed: None,
            is_error: false,
            attr: HashMap::new(),
        }
    }

    pub fn add_attr(&mut self, key: impl Into<String>, value: impl ToString) {
        self.attr.insert(key.into(), value.to_string());
    }

    pub fn duration(&self) -> Option<Duration> {
        self.elapsed
    }

    pub(crate) fn finish<T, E>(&mut self, response: &Result<T, E>) {
        self.elapsed = Some(self.started.elapsed());
        self.is_error = response.is_err();
    }
}

/// Stop the clock on an operation and hand it to the reporter.
pub fn report_operation<T, E>(
    reporter: &Reporter,
    mut operation_record: OperationRecord,
    response: &Result<T, E>,
) {
    operation_record.finish(response);
    reporter.add_operation(&operation_record);
}

/// The outcome of one named check in one iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
}

impl CheckResult {
    pub fn new(name: impl Into<String>, passed: bool) -> Self {
        Self {
            name: name.into(),
            passed,
        }
    }
}

/// Everything recorded about one iteration of one virtual user.
#[derive(Debug, Clone)]
pub struct IterationRecord {
    pub vu_id: String,
    pub iteration: u64,
    pub started: Instant,
    pub elapsed: Duration,
    pub checks: Vec<CheckResult>,
    /// The iteration was cut short by the run shutting down. Its checks are not counted.
    pub interrupted: bool,
}
