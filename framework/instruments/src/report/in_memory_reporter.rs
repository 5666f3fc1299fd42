mod operations_table;

use std::collections::BTreeMap;
use std::time::Duration;

use tabled::settings::Style;
use tabled::Table;

use crate::report::in_memory_reporter::operations_table::{CheckRow, IterationRow, OperationRow};
use crate::report::{CheckTally, ReportCollector};
use crate::{IterationRecord, OperationRecord};

/// Running min/max/total for a stream of durations.
#[derive(Debug, Default, Clone, Copy)]
struct TimingStats {
    count: u64,
    total: Duration,
    min: Option<Duration>,
    max: Option<Duration>,
}

impl TimingStats {
    fn observe(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
        self.min = Some(self.min.map_or(elapsed, |m| m.min(elapsed)));
        self.max = Some(self.max.map_or(elapsed, |m| m.max(elapsed)));
    }

    fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        as_ms(self.total) / self.count as f64
    }
}

fn as_ms(duration: Duration) -> f64 {
    duration.as_micros() as f64 / 1000.0
}

#[derive(Debug, Default)]
struct OperationStats {
    timing: TimingStats,
    errors: u64,
}

/// A summary reporter that folds everything into per-name statistics as it arrives and prints
/// tables at the end of the run. Memory use does not grow with the number of iterations.
#[derive(Debug, Default)]
pub struct InMemoryReporter {
    operations: BTreeMap<String, OperationStats>,
    checks: BTreeMap<String, CheckTally>,
    iterations: TimingStats,
    interrupted: u64,
}

impl InMemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn operation_rows(&self) -> Vec<OperationRow> {
        self.operations
            .iter()
            .map(|(operation_id, stats)| OperationRow {
                operation_id: operation_id.clone(),
                avg_time_ms: stats.timing.avg_ms(),
                min_time_ms: stats.timing.min.map(as_ms).unwrap_or_default(),
                max_time_ms: stats.timing.max.map(as_ms).unwrap_or_default(),
                total_operations: stats.timing.count,
                errors: stats.errors,
                total_duration_ms: as_ms(stats.timing.total),
            })
            .collect()
    }

    fn check_rows(&self) -> Vec<CheckRow> {
        self.checks
            .iter()
            .map(|(check, tally)| CheckRow {
                check: check.clone(),
                passes: tally.passes,
                fails: tally.fails,
                pass_rate: if tally.total() == 0 {
                    0.0
                } else {
                    tally.passes as f64 * 100.0 / tally.total() as f64
                },
            })
            .collect()
    }

    fn iteration_row(&self) -> IterationRow {
        IterationRow {
            iterations: self.iterations.count,
            interrupted: self.interrupted,
            avg_time_ms: self.iterations.avg_ms(),
            min_time_ms: self.iterations.min.map(as_ms).unwrap_or_default(),
            max_time_ms: self.iterations.max.map(as_ms).unwrap_or_default(),
        }
    }

    pub(crate) fn print_summary(&self) {
        println!("\nSummary of iterations");
        let mut table = Table::new([self.iteration_row()]);
        table.with(Style::modern());
        println!("{table}");

        if !self.checks.is_empty() {
            println!("\nSummary of checks");
            let mut table = Table::new(self.check_rows());
            table.with(Style::modern());
            println!("{table}");
        }

        if !self.operations.is_empty() {
            println!("\nSummary of operations");
            let mut table = Table::new(self.operation_rows());
            table.with(Style::modern());
            println!("{table}");
        }
    }
}

impl ReportCollector for InMemoryReporter {
    fn add_operation(&mut self, operation_record: &OperationRecord) {
        let Some(elapsed) = operation_record.duration() else {
            log::warn!(
                "Operation {} was reported without being timed",
                operation_record.operation_id
            );
            return;
        };

        let stats = self
            .operations
            .entry(operation_record.operation_id.clone())
            .or_default();
        stats.timing.observe(elapsed);
        if operation_record.is_error {
            stats.errors += 1;
        }
    }

    fn add_iteration(&mut self, iteration_record: &IterationRecord) {
        if iteration_record.interrupted {
            self.interrupted += 1;
            return;
        }

        self.iterations.observe(iteration_record.elapsed);
        for check in &iteration_record.checks {
            let tally = self.checks.entry(check.name.clone()).or_default();
            if check.passed {
                tally.passes += 1;
            } else {
                tally.fails += 1;
            }
        }
    }

    fn finalize(&self) {
        self.print_summary();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::CheckResult;

    fn timed_operation(is_error: bool, millis: u64) -> OperationRecord {
        let mut record = OperationRecord::new("http_get");
        record.elapsed = Some(Duration::from_millis(millis));
        record.is_error = is_error;
        record
    }

    #[test]
    fn folds_operations_into_rows() {
        let mut reporter = InMemoryReporter::new();
        reporter.add_operation(&timed_operation(false, 10));
        reporter.add_operation(&timed_operation(true, 30));
        reporter.add_operation(&OperationRecord::new("never_finished"));

        let rows = reporter.operation_rows();
        assert_eq!(1, rows.len());
        assert_eq!("http_get", rows[0].operation_id);
        assert_eq!(2, rows[0].total_operations);
        assert_eq!(1, rows[0].errors);
        assert_eq!(20.0, rows[0].avg_time_ms);
        assert_eq!(10.0, rows[0].min_time_ms);
        assert_eq!(30.0, rows[0].max_time_ms);
    }

    #[test]
    fn computes_pass_rate() {
        let mut reporter = InMemoryReporter::new();
        for passed in [true, true, true, false] {
            reporter.add_iteration(&IterationRecord {
                vu_id: "vu-0".to_string(),
                iteration: 0,
                started: Instant::now(),
                elapsed: Duration::from_millis(1),
                checks: vec![CheckResult::new("status was 200", passed)],
                interrupted: false,
            });
        }

        let rows = reporter.check_rows();
        assert_eq!(3, rows[0].passes);
        assert_eq!(1, rows[0].fails);
        assert_eq!(75.0, rows[0].pass_rate);
        assert_eq!(4, reporter.iteration_row().iterations);
    }
}
