use std::time::Duration;

use surge_core::prelude::{RampProfile, SchedulerFault};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Ramping,
    /// The ramp is over or the run was stopped. No new virtual users, existing ones are retired.
    Draining,
    Done,
}

/// The virtual users the scheduler is steering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Population {
    /// Running and not asked to retire.
    pub active: usize,
    /// Threads that have not finished yet, including retiring ones.
    pub alive: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulationChange {
    Hold,
    Spawn(usize),
    /// Ask this many active virtual users to stop after their current iteration.
    Retire(usize),
}

/// Steers the virtual user population along a [RampProfile].
///
/// The scheduler keeps no clock of its own. The run loop passes the elapsed time at every tick,
/// which keeps this type free of I/O.
#[derive(Debug)]
pub struct RampScheduler {
    profile: RampProfile,
    state: SchedulerState,
}

impl RampScheduler {
    pub fn new(profile: RampProfile) -> Self {
        Self {
            profile,
            state: SchedulerState::Idle,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn start(&mut self) {
        if self.state == SchedulerState::Idle {
            log::info!(
                "Starting ramp over {:?} with {} stage(s)",
                self.profile.total_duration(),
                self.profile.stages().len()
            );
            self.state = SchedulerState::Ramping;
        }
    }

    /// End the ramp early.
    pub fn stop(&mut self) {
        if matches!(self.state, SchedulerState::Idle | SchedulerState::Ramping) {
            log::info!("Ramp stopped early, draining virtual users");
            self.state = SchedulerState::Draining;
        }
    }

    /// Decide how the population should change at `elapsed` since the start of the ramp.
    pub fn tick(
        &mut self,
        elapsed: Duration,
        population: Population,
    ) -> Result<PopulationChange, SchedulerFault> {
        if self.state == SchedulerState::Ramping && elapsed > self.profile.total_duration() {
            log::info!("Ramp complete after {:?}, draining virtual users", elapsed);
            self.state = SchedulerState::Draining;
        }

        match self.state {
            SchedulerState::Idle | SchedulerState::Done => Ok(PopulationChange::Hold),
            SchedulerState::Ramping => {
                let desired = self.desired_vus(elapsed)?;
                Ok(match desired.cmp(&population.active) {
                    std::cmp::Ordering::Greater => {
                        PopulationChange::Spawn(desired - population.active)
                    }
                    std::cmp::Ordering::Less => PopulationChange::Retire(population.active - desired),
                    std::cmp::Ordering::Equal => PopulationChange::Hold,
                })
            }
            SchedulerState::Draining => {
                if population.alive == 0 {
                    log::info!("All virtual users have stopped");
                    self.state = SchedulerState::Done;
                    Ok(PopulationChange::Hold)
                } else if population.active > 0 {
                    Ok(PopulationChange::Retire(population.active))
                } else {
                    Ok(PopulationChange::Hold)
                }
            }
        }
    }

    fn desired_vus(&self, elapsed: Duration) -> Result<usize, SchedulerFault> {
        let target = self.profile.target_at(elapsed);
        if !target.is_finite() || target < 0.0 {
            return Err(SchedulerFault::InvalidTarget { target, elapsed });
        }

        Ok(self.profile.desired_vus(elapsed))
    }
}
