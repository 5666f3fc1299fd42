use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use surge_instruments::IterationRecord;

use crate::shutdown::DelegatedShutdownListener;
use crate::context::{RunnerContext, UserValuesConstraint, VuContext};
use crate::definition::{IterationFn, VuHookMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VuState {
    Running,
    /// Asked to stop, finishing its current iteration.
    Retiring,
    Stopped,
}

/// The hooks a virtual user runs, copied out of the scenario definition.
pub(crate) struct VuBehaviour<RV: UserValuesConstraint, V: UserValuesConstraint> {
    pub setup_vu_fn: Option<VuHookMut<RV, V>>,
    pub iteration_fn: IterationFn<RV, V>,
    pub teardown_vu_fn: Option<VuHookMut<RV, V>>,
    /// Stop after this many iterations even if not retired.
    pub iteration_limit: Option<u64>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> Clone for VuBehaviour<RV, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> Copy for VuBehaviour<RV, V> {}

/// The scheduler's side of a running virtual user.
pub(crate) struct VuHandle {
    id: String,
    retire: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl VuHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> VuState {
        if self.thread.is_finished() {
            VuState::Stopped
        } else if self.retire.load(Ordering::Acquire) {
            VuState::Retiring
        } else {
            VuState::Running
        }
    }

    /// Ask the virtual user to stop once its current iteration is done.
    pub fn retire(&self) {
        self.retire.store(true, Ordering::Release);
        self.thread.thread().unpark();
    }

    pub fn join(self) {
        if self.thread.join().is_err() {
            log::error!("Virtual user {} panicked", self.id);
        }
    }
}

/// Start a virtual user on its own thread. It begins iterating immediately.
pub(crate) fn spawn_vu<RV: UserValuesConstraint, V: UserValuesConstraint>(
    vu_id: String,
    runner_context: Arc<RunnerContext<RV>>,
    behaviour: VuBehaviour<RV, V>,
) -> std::io::Result<VuHandle> {
    let retire = Arc::new(AtomicBool::new(false));
    let shutdown_listener = runner_context.shutdown_handle().new_listener();

    let thread = std::thread::Builder::new().name(vu_id.clone()).spawn({
        let vu_id = vu_id.clone();
        let retire = retire.clone();
        move || {
            let mut context = VuContext::new(vu_id, runner_context, shutdown_listener);
            run_vu(&mut context, behaviour, &retire);
        }
    })?;

    Ok(VuHandle {
        id: vu_id,
        retire,
        thread,
    })
}

fn run_vu<RV: UserValuesConstraint, V: UserValuesConstraint>(
    context: &mut VuContext<RV, V>,
    behaviour: VuBehaviour<RV, V>,
    retire: &AtomicBool,
) {
    if let Some(setup_vu_fn) = behaviour.setup_vu_fn {
        if let Err(e) = setup_vu_fn(context) {
            log::error!("Setup failed for virtual user {}: {:?}", context.vu_id(), e);
            if behaviour.iteration_limit.is_some() {
                return;
            }
            // Hold the slot without iterating until retired.
            while !should_stop(retire, context.shutdown_listener()) {
                std::thread::park_timeout(Duration::from_millis(100));
            }
            return;
        }
    }

    log::trace!("Virtual user {} started", context.vu_id());

    let reporter = context.runner_context().reporter();
    loop {
        if should_stop(retire, context.shutdown_listener()) {
            log::debug!("Stopping virtual user {}", context.vu_id());
            break;
        }
        if behaviour
            .iteration_limit
            .is_some_and(|limit| context.iteration() >= limit)
        {
            break;
        }

        let started = Instant::now();
        let outcome = (behaviour.iteration_fn)(context);
        let record = IterationRecord {
            vu_id: context.vu_id().to_string(),
            iteration: context.iteration(),
            started,
            elapsed: started.elapsed(),
            interrupted: outcome.is_interrupted(),
            checks: outcome.checks,
        };
        reporter.add_iteration(&record);

        context.next_iteration();
    }

    if let Some(teardown_vu_fn) = behaviour.teardown_vu_fn {
        if let Err(e) = teardown_vu_fn(context) {
            log::error!(
                "Teardown failed for virtual user {}: {:?}",
                context.vu_id(),
                e
            );
        }
    }
}

fn should_stop(retire: &AtomicBool, shutdown_listener: &DelegatedShutdownListener) -> bool {
    retire.load(Ordering::Acquire) || shutdown_listener.should_shutdown()
}
