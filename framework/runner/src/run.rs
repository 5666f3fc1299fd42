use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use surge_core::prelude::SchedulerFault;
use surge_instruments::ReportConfig;
use surge_summary_model::{append_run_summary, CheckSummary, RunSummary, StageSummary};

use crate::cli::ReporterOpt;
use crate::http::HttpClientInstrumented;
use crate::progress::start_progress;
use crate::scheduler::{Population, PopulationChange, RampScheduler, SchedulerState};
use crate::vu::{spawn_vu, VuBehaviour, VuHandle, VuState};
use crate::{
    context::{RunnerContext, UserValuesConstraint},
    definition::ScenarioDefinitionBuilder,
    executor::Executor,
    shutdown::{start_shutdown_listener, ShutdownHandle},
};

/// Run a scenario to completion and return its summary.
///
/// Virtual users are started and retired along the declared ramp. Once the ramp is over the
/// remaining virtual users finish their current iteration, or are cancelled when the graceful stop
/// period runs out.
pub fn run<RV: UserValuesConstraint, V: UserValuesConstraint>(
    definition: ScenarioDefinitionBuilder<RV, V>,
) -> anyhow::Result<RunSummary> {
    let definition = definition.build()?;
    let config = definition.config.clone();

    log::info!(
        "Running scenario: {} (run id {})",
        config.scenario_name,
        config.run_id
    );

    let started_at = chrono::Utc::now().timestamp();
    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime);
    let executor = Arc::new(Executor::new(runtime, shutdown_handle.clone()));
    let reporter = Arc::new(
        match definition.reporter {
            ReporterOpt::InMemory => ReportConfig::default().enable_summary(),
            ReporterOpt::Noop => ReportConfig::default(),
        }
        .init(),
    );
    let http_client = HttpClientInstrumented::new(config.http_timeout, reporter.clone())?;
    let mut runner_context = RunnerContext::new(
        executor,
        reporter.clone(),
        shutdown_handle.clone(),
        config.clone(),
        http_client,
    );

    if let Some(setup_fn) = &definition.setup_fn {
        setup_fn(&mut runner_context)?;
    }

    let runner_context = Arc::new(runner_context);
    let behaviour = VuBehaviour {
        setup_vu_fn: definition.setup_vu_fn,
        iteration_fn: definition.iteration_fn,
        teardown_vu_fn: definition.teardown_vu_fn,
        iteration_limit: None,
    };

    let active_vus = Arc::new(AtomicUsize::new(0));
    if !definition.no_progress && !config.profile.is_empty() {
        start_progress(
            config.profile.total_duration(),
            active_vus.clone(),
            shutdown_handle.new_listener(),
        );
    }

    let peak_vus = if config.profile.is_empty() {
        log::info!("No stages declared, running a single iteration");
        run_single_iteration(&runner_context, behaviour, &active_vus)?
    } else {
        run_ramp(&runner_context, behaviour, &active_vus)?
    };

    if let Some(teardown_fn) = definition.teardown_fn {
        // The hook is best effort, reporting still has to happen.
        if let Err(e) = teardown_fn(runner_context.clone()) {
            log::error!("Teardown failed: {:?}", e);
        }
    }

    // Stops the progress bar and any background work left on the runtime.
    shutdown_handle.shutdown();
    reporter.finalize();

    let totals = reporter.totals();
    let mut summary = RunSummary::new(
        config.run_id.clone(),
        config.scenario_name.clone(),
        started_at,
        config
            .profile
            .stages()
            .iter()
            .map(|stage| StageSummary {
                duration_ms: u64::try_from(stage.duration.as_millis()).unwrap_or(u64::MAX),
                target: stage.target,
            })
            .collect(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    summary.set_peak_vus(peak_vus);
    summary.set_iterations(totals.iterations, totals.interrupted_iterations);
    for (name, tally) in reporter.check_tallies() {
        summary.add_check(
            name,
            CheckSummary {
                passes: tally.passes,
                fails: tally.fails,
            },
        );
    }

    log::info!(
        "Run {} finished: {} iterations ({} interrupted), {} checks passed, {} failed",
        summary.run_id,
        summary.iterations,
        summary.interrupted_iterations,
        summary.checks_passed(),
        summary.checks_failed()
    );

    if let Some(path) = definition.summary_file {
        append_run_summary(&summary, path).context("Failed to write run summary")?;
    }

    Ok(summary)
}

/// One virtual user, one iteration.
fn run_single_iteration<RV: UserValuesConstraint, V: UserValuesConstraint>(
    runner_context: &Arc<RunnerContext<RV>>,
    behaviour: VuBehaviour<RV, V>,
    active_vus: &AtomicUsize,
) -> Result<usize, SchedulerFault> {
    let vu_id = "vu-0".to_string();
    let handle = spawn_vu(
        vu_id.clone(),
        runner_context.clone(),
        VuBehaviour {
            iteration_limit: Some(1),
            ..behaviour
        },
    )
    .map_err(|e| SchedulerFault::SpawnFailed {
        vu_id,
        reason: e.to_string(),
    })?;

    active_vus.store(1, Ordering::Relaxed);
    handle.join();
    active_vus.store(0, Ordering::Relaxed);

    Ok(1)
}

/// Drive the virtual user population along the ramp until every virtual user has stopped.
///
/// Returns the largest number of virtual users that were active at once.
fn run_ramp<RV: UserValuesConstraint, V: UserValuesConstraint>(
    runner_context: &Arc<RunnerContext<RV>>,
    behaviour: VuBehaviour<RV, V>,
    active_vus: &AtomicUsize,
) -> Result<usize, SchedulerFault> {
    let config = runner_context.config();
    let shutdown_handle = runner_context.shutdown_handle();

    let mut scheduler = RampScheduler::new(config.profile.clone());
    let mut handles: Vec<VuHandle> = Vec::new();
    let mut next_vu_index = 0usize;
    let mut peak_vus = 0usize;
    let mut draining_since: Option<Instant> = None;

    let start = Instant::now();
    scheduler.start();

    loop {
        let (stopped, alive): (Vec<_>, Vec<_>) = handles
            .into_iter()
            .partition(|handle| handle.state() == VuState::Stopped);
        handles = alive;
        stopped.into_iter().for_each(VuHandle::join);

        if shutdown_handle.is_shutdown() {
            scheduler.stop();
        }

        let population = Population {
            active: count_running(&handles),
            alive: handles.len(),
        };

        let change = match scheduler.tick(start.elapsed(), population) {
            Ok(change) => change,
            Err(fault) => return Err(abort(handles, shutdown_handle, fault)),
        };

        match change {
            PopulationChange::Hold => {}
            PopulationChange::Spawn(count) => {
                log::debug!("Starting {count} virtual user(s)");
                for _ in 0..count {
                    let vu_id = format!("vu-{next_vu_index}");
                    next_vu_index += 1;

                    match spawn_vu(vu_id.clone(), runner_context.clone(), behaviour) {
                        Ok(handle) => handles.push(handle),
                        Err(e) => {
                            let fault = SchedulerFault::SpawnFailed {
                                vu_id,
                                reason: e.to_string(),
                            };
                            return Err(abort(handles, shutdown_handle, fault));
                        }
                    }
                }
            }
            PopulationChange::Retire(count) => {
                log::debug!("Retiring {count} virtual user(s)");
                // Newest first
                handles
                    .iter()
                    .rev()
                    .filter(|handle| handle.state() == VuState::Running)
                    .take(count)
                    .for_each(VuHandle::retire);
            }
        }

        let active = count_running(&handles);
        active_vus.store(active, Ordering::Relaxed);
        peak_vus = peak_vus.max(active);

        match scheduler.state() {
            SchedulerState::Done => break,
            SchedulerState::Draining => {
                let since = *draining_since.get_or_insert_with(Instant::now);
                if since.elapsed() > config.graceful_stop && !shutdown_handle.is_shutdown() {
                    log::warn!(
                        "Graceful stop of {:?} expired with {} virtual user(s) still running, cancelling in-flight work",
                        config.graceful_stop,
                        handles.len()
                    );
                    shutdown_handle.shutdown();
                }
            }
            SchedulerState::Idle | SchedulerState::Ramping => {}
        }

        std::thread::sleep(config.tick);
    }

    Ok(peak_vus)
}

fn count_running(handles: &[VuHandle]) -> usize {
    handles
        .iter()
        .filter(|handle| handle.state() == VuState::Running)
        .count()
}

/// Stop every virtual user and wait for them before reporting the fault.
fn abort(
    handles: Vec<VuHandle>,
    shutdown_handle: &ShutdownHandle,
    fault: SchedulerFault,
) -> SchedulerFault {
    log::error!("Scheduler fault, aborting the run: {fault}");
    shutdown_handle.shutdown();
    for handle in handles {
        log::trace!("Waiting for virtual user {}", handle.id());
        handle.join();
    }
    fault
}
