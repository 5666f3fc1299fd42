use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DeclarationError;

/// One segment of the ramp, as written in a declaration.
///
/// `duration` is a human readable span such as `15s` or `1m30s`. Validation into a [Stage] happens
/// when the whole list is turned into a [RampProfile], so that errors can name the stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOptions {
    pub duration: String,
    pub target: i64,
}

impl StageOptions {
    pub fn new(duration: impl Into<String>, target: i64) -> Self {
        Self {
            duration: duration.into(),
            target,
        }
    }
}

/// Parses `DURATION:TARGET`, for example `1m30s:500`.
impl FromStr for StageOptions {
    type Err = DeclarationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || DeclarationError::MalformedStage {
            value: s.to_string(),
        };

        let (duration, target) = s.trim().rsplit_once(':').ok_or_else(malformed)?;
        let target = target.trim().parse::<i64>().map_err(|_| malformed())?;

        Ok(Self::new(duration.trim(), target))
    }
}

/// A validated ramp segment: reach `target` virtual users over `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: usize,
}

impl Stage {
    pub fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }
}

/// Parse a human readable time span into a [Duration].
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value.trim()).map_err(|e| e.to_string())
}

/// The ordered stage sequence of a workload. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RampProfile {
    stages: Vec<Stage>,
}

impl RampProfile {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Validate declared stages, stopping at the first bad one.
    ///
    /// The whole ramp has to fit in `u64` milliseconds, the unit it is reported in.
    pub fn from_options(options: &[StageOptions]) -> Result<Self, DeclarationError> {
        let mut stages = Vec::with_capacity(options.len());
        let mut total = Duration::ZERO;

        for (index, option) in options.iter().enumerate() {
            let value = option.duration.trim();
            if value.starts_with('-') {
                return Err(DeclarationError::NegativeDuration {
                    index,
                    value: value.to_string(),
                });
            }
            let duration =
                parse_duration(value).map_err(|reason| DeclarationError::UnparsableDuration {
                    index,
                    value: value.to_string(),
                    reason,
                })?;
            let target = usize::try_from(option.target).map_err(|_| {
                DeclarationError::NegativeTarget {
                    index,
                    target: option.target,
                }
            })?;

            total = total
                .checked_add(duration)
                .filter(|total| u64::try_from(total.as_millis()).is_ok())
                .ok_or_else(|| DeclarationError::RampTooLong {
                    index,
                    value: value.to_string(),
                })?;

            stages.push(Stage::new(duration, target));
        }

        Ok(Self::new(stages))
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Sum of all stage durations. Draining starts once this has elapsed.
    pub fn total_duration(&self) -> Duration {
        self.stages
            .iter()
            .fold(Duration::ZERO, |total, s| total.saturating_add(s.duration))
    }

    pub fn peak_target(&self) -> usize {
        self.stages.iter().map(|s| s.target).max().unwrap_or(0)
    }

    /// The interpolated target concurrency at `elapsed` since the start of the ramp.
    ///
    /// Within a stage the target moves linearly from the previous stage's target (0 for the first
    /// stage) to this stage's target. A zero duration stage jumps straight to its target. Past the
    /// end of the ramp the last target is held.
    pub fn target_at(&self, elapsed: Duration) -> f64 {
        let mut level = 0.0;
        let mut stage_start = Duration::ZERO;

        for stage in &self.stages {
            let stage_end = stage_start.saturating_add(stage.duration);
            if elapsed < stage_end {
                let progress = (elapsed - stage_start).as_secs_f64() / stage.duration.as_secs_f64();
                return level + (stage.target as f64 - level) * progress;
            }

            level = stage.target as f64;
            stage_start = stage_end;
        }

        level
    }

    /// [RampProfile::target_at] rounded to a whole number of virtual users, ties rounding up.
    pub fn desired_vus(&self, elapsed: Duration) -> usize {
        (self.target_at(elapsed) + 0.5).floor() as usize
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn reference_profile() -> RampProfile {
        RampProfile::from_options(&[
            StageOptions::new("15s", 500),
            StageOptions::new("1m30s", 500),
            StageOptions::new("15s", 0),
        ])
        .unwrap()
    }

    #[test]
    fn parses_human_readable_durations() {
        let profile = reference_profile();

        assert_eq!(
            vec![
                Stage::new(secs(15), 500),
                Stage::new(secs(90), 500),
                Stage::new(secs(15), 0),
            ],
            profile.stages().to_vec()
        );
        assert_eq!(secs(120), profile.total_duration());
        assert_eq!(500, profile.peak_target());
    }

    #[test]
    fn reference_ramp_reaches_holds_and_returns() {
        let profile = reference_profile();

        assert_eq!(0, profile.desired_vus(Duration::ZERO));
        assert_eq!(250, profile.desired_vus(Duration::from_millis(7_500)));
        assert_eq!(500, profile.desired_vus(secs(15)));
        assert_eq!(500, profile.desired_vus(secs(60)));
        assert_eq!(500, profile.desired_vus(secs(105)));
        assert_eq!(250, profile.desired_vus(Duration::from_millis(112_500)));
        assert_eq!(0, profile.desired_vus(secs(120)));
    }

    #[test]
    fn zero_duration_stage_jumps() {
        let profile = RampProfile::new(vec![
            Stage::new(Duration::ZERO, 10),
            Stage::new(secs(10), 10),
            Stage::new(Duration::ZERO, 40),
            Stage::new(secs(10), 0),
        ]);

        assert_eq!(10.0, profile.target_at(Duration::ZERO));
        assert_eq!(10.0, profile.target_at(Duration::from_millis(9_999)));
        assert_eq!(40.0, profile.target_at(secs(10)));
        assert_eq!(20.0, profile.target_at(secs(15)));
    }

    #[test]
    fn target_is_continuous_across_positive_stages() {
        let profile = RampProfile::new(vec![
            Stage::new(secs(3), 7),
            Stage::new(secs(5), 2),
            Stage::new(secs(2), 9),
        ]);

        let step = Duration::from_millis(1);
        let mut previous = profile.target_at(Duration::ZERO);
        let mut t = step;
        while t <= profile.total_duration() {
            let current = profile.target_at(t);
            // Largest slope is 3.5 VUs per second, so 1ms can never move more than 0.0035.
            assert!((current - previous).abs() < 0.004, "jump at {t:?}");
            previous = current;
            t += step;
        }
    }

    #[test]
    fn ties_round_up() {
        let profile = RampProfile::new(vec![Stage::new(secs(2), 1)]);

        assert_eq!(0, profile.desired_vus(Duration::from_millis(999)));
        assert_eq!(1, profile.desired_vus(secs(1)));
    }

    #[test]
    fn holds_last_target_past_the_end() {
        let profile = RampProfile::new(vec![Stage::new(secs(1), 3)]);

        assert_eq!(3, profile.desired_vus(secs(100)));
    }

    #[test]
    fn empty_profile_has_no_length() {
        let profile = RampProfile::default();

        assert!(profile.is_empty());
        assert_eq!(Duration::ZERO, profile.total_duration());
        assert_eq!(0, profile.desired_vus(secs(1)));
    }

    #[test]
    fn rejects_negative_target() {
        let err = RampProfile::from_options(&[
            StageOptions::new("1s", 1),
            StageOptions::new("1s", -3),
        ])
        .unwrap_err();

        assert_eq!(
            DeclarationError::NegativeTarget {
                index: 1,
                target: -3
            },
            err
        );
    }

    #[test]
    fn rejects_negative_duration() {
        let err = RampProfile::from_options(&[StageOptions::new("-5s", 1)]).unwrap_err();

        assert_eq!(
            DeclarationError::NegativeDuration {
                index: 0,
                value: "-5s".to_string()
            },
            err
        );
    }

    #[test]
    fn rejects_unparsable_duration() {
        let err = RampProfile::from_options(&[StageOptions::new("fortnight", 1)]).unwrap_err();

        assert!(matches!(
            err,
            DeclarationError::UnparsableDuration { index: 0, .. }
        ));
    }

    #[test]
    fn rejects_ramp_longer_than_reportable() {
        let err = RampProfile::from_options(&[
            StageOptions::new("1s", 1),
            StageOptions::new("18446744073709551615s", 1),
            StageOptions::new("18446744073709551615s", 1),
        ])
        .unwrap_err();

        assert!(matches!(err, DeclarationError::RampTooLong { index: 1, .. }));
    }

    #[test]
    fn rejects_when_running_total_is_too_long() {
        let err = RampProfile::from_options(&[
            StageOptions::new("5000000000000000s", 1),
            StageOptions::new("5000000000000000s", 1),
            StageOptions::new("9000000000000000s", 0),
        ])
        .unwrap_err();

        assert!(matches!(err, DeclarationError::RampTooLong { index: 2, .. }));
    }

    #[test]
    fn unchecked_profile_saturates_instead_of_panicking() {
        let profile = RampProfile::new(vec![
            Stage::new(Duration::MAX, 1),
            Stage::new(Duration::MAX, 2),
        ]);

        assert_eq!(Duration::MAX, profile.total_duration());
        assert_eq!(2, profile.desired_vus(Duration::MAX));
    }

    #[test]
    fn parses_stage_from_cli_form() {
        assert_eq!(
            StageOptions::new("1m30s", 500),
            "1m30s:500".parse::<StageOptions>().unwrap()
        );
        assert!("1m30s".parse::<StageOptions>().is_err());
        assert!("1m30s:lots".parse::<StageOptions>().is_err());
    }
}
