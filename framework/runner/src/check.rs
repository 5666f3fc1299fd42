use std::fmt::{Debug, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use surge_instruments::CheckResult;

/// A named boolean assertion over the subject of an iteration, usually its response.
///
/// The predicate must be pure. If it panics the check is recorded as failed and the panic goes no
/// further than this one result.
pub struct Check<R: ?Sized> {
    name: String,
    predicate: Arc<dyn Fn(&R) -> bool + Send + Sync>,
}

impl<R: ?Sized> Check<R> {
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&R) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluate(&self, subject: &R) -> CheckResult {
        let passed = match catch_unwind(AssertUnwindSafe(|| (self.predicate)(subject))) {
            Ok(passed) => passed,
            Err(_) => {
                log::warn!("Check [{}] panicked, recording it as failed", self.name);
                false
            }
        };

        CheckResult::new(self.name.clone(), passed)
    }
}

impl<R: ?Sized> Clone for Check<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            predicate: self.predicate.clone(),
        }
    }
}

impl<R: ?Sized> Debug for Check<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Check").field("name", &self.name).finish()
    }
}

/// Evaluate every check against `subject`, in declaration order.
pub fn check<R: ?Sized>(subject: &R, checks: &[Check<R>]) -> Vec<CheckResult> {
    checks.iter().map(|c| c.evaluate(subject)).collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn evaluates_in_order() {
        let checks = vec![
            Check::new("positive", |n: &i32| *n > 0),
            Check::new("even", |n: &i32| n % 2 == 0),
        ];

        assert_eq!(
            vec![
                CheckResult::new("positive", true),
                CheckResult::new("even", false),
            ],
            check(&3, &checks)
        );
    }

    #[test]
    fn panicking_predicate_fails_only_itself() {
        let checks = vec![
            Check::new("faulty", |_: &str| panic!("predicate fault")),
            Check::new("not empty", |s: &str| !s.is_empty()),
        ];

        let results = check("body", &checks);

        assert_eq!(
            vec![
                CheckResult::new("faulty", false),
                CheckResult::new("not empty", true),
            ],
            results
        );
    }
}
