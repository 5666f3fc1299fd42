mod in_memory_reporter;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::{IterationRecord, OperationRecord};

pub use in_memory_reporter::InMemoryReporter;

pub trait ReportCollector {
    fn add_operation(&mut self, operation_record: &OperationRecord);

    fn add_iteration(&mut self, iteration_record: &IterationRecord);

    fn finalize(&self);
}

/// Pass and fail counts for one named check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckTally {
    pub passes: u64,
    pub fails: u64,
}

impl CheckTally {
    pub fn total(&self) -> u64 {
        self.passes + self.fails
    }
}

/// A point in time copy of the run-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub iterations: u64,
    pub interrupted_iterations: u64,
    pub checks_passed: u64,
    pub checks_failed: u64,
    pub operations: u64,
    pub operation_errors: u64,
}

#[derive(Default)]
struct Counters {
    iterations: AtomicU64,
    interrupted_iterations: AtomicU64,
    checks_passed: AtomicU64,
    checks_failed: AtomicU64,
    operations: AtomicU64,
    operation_errors: AtomicU64,
}

/// The metrics sink shared by every virtual user of a run.
///
/// Totals are plain atomics. Per check tallies and the configured collectors sit behind their own
/// locks, so writers only ever contend on the part they touch.
pub struct Reporter {
    counters: Counters,
    check_tallies: Mutex<BTreeMap<String, CheckTally>>,
    collectors: Vec<Mutex<Box<dyn ReportCollector + Send>>>,
}

impl Reporter {
    fn new(collectors: Vec<Box<dyn ReportCollector + Send>>) -> Self {
        Self {
            counters: Counters::default(),
            check_tallies: Mutex::new(BTreeMap::new()),
            collectors: collectors.into_iter().map(Mutex::new).collect(),
        }
    }

    pub fn add_operation(&self, operation_record: &OperationRecord) {
        self.counters.operations.fetch_add(1, Ordering::Relaxed);
        if operation_record.is_error {
            self.counters.operation_errors.fetch_add(1, Ordering::Relaxed);
        }

        for collector in &self.collectors {
            collector.lock().add_operation(operation_record);
        }
    }

    pub fn add_iteration(&self, iteration_record: &IterationRecord) {
        if iteration_record.interrupted {
            self.counters
                .interrupted_iterations
                .fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.iterations.fetch_add(1, Ordering::Relaxed);

            if !iteration_record.checks.is_empty() {
                let mut tallies = self.check_tallies.lock();
                for check in &iteration_record.checks {
                    let tally = tallies.entry(check.name.clone()).or_default();
                    if check.passed {
                        tally.passes += 1;
                        self.counters.checks_passed.fetch_add(1, Ordering::Relaxed);
                    } else {
                        tally.fails += 1;
                        self.counters.checks_failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }

        for collector in &self.collectors {
            collector.lock().add_iteration(iteration_record);
        }
    }

    pub fn totals(&self) -> RunTotals {
        RunTotals {
            iterations: self.counters.iterations.load(Ordering::Relaxed),
            interrupted_iterations: self.counters.interrupted_iterations.load(Ordering::Relaxed),
            checks_passed: self.counters.checks_passed.load(Ordering::Relaxed),
            checks_failed: self.counters.checks_failed.load(Ordering::Relaxed),
            operations: self.counters.operations.load(Ordering::Relaxed),
            operation_errors: self.counters.operation_errors.load(Ordering::Relaxed),
        }
    }

    pub fn check_tallies(&self) -> BTreeMap<String, CheckTally> {
        self.check_tallies.lock().clone()
    }

    pub fn finalize(&self) {
        for collector in &self.collectors {
            collector.lock().finalize();
        }
    }
}

/// Chooses which collectors a [Reporter] forwards to. With nothing enabled the reporter still
/// keeps its totals.
#[derive(Debug, Default)]
pub struct ReportConfig {
    enable_summary: bool,
}

impl ReportConfig {
    pub fn enable_summary(mut self) -> Self {
        self.enable_summary = true;
        self
    }

    pub fn init(self) -> Reporter {
        let mut collectors: Vec<Box<dyn ReportCollector + Send>> = Vec::new();
        if self.enable_summary {
            collectors.push(Box::new(InMemoryReporter::new()));
        }

        Reporter::new(collectors)
    }
}
