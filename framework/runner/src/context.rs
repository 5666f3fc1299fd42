use std::{fmt::Debug, sync::Arc, time::Duration};

use surge_core::prelude::{DelegatedShutdownListener, ShutdownHandle, TransportError};
use surge_instruments::Reporter;

use crate::definition::RunConfig;
use crate::executor::Executor;
use crate::http::{HttpClientInstrumented, HttpResult};

pub trait UserValuesConstraint: Default + Debug + Send + Sync + 'static {}

impl UserValuesConstraint for () {}

/// State shared by the whole run. Virtual users only get read access to it.
pub struct RunnerContext<RV: UserValuesConstraint> {
    executor: Arc<Executor>,
    reporter: Arc<Reporter>,
    shutdown_handle: ShutdownHandle,
    config: Arc<RunConfig>,
    http_client: HttpClientInstrumented,
    value: RV,
}

impl<RV: UserValuesConstraint> RunnerContext<RV> {
    pub(crate) fn new(
        executor: Arc<Executor>,
        reporter: Arc<Reporter>,
        shutdown_handle: ShutdownHandle,
        config: Arc<RunConfig>,
        http_client: HttpClientInstrumented,
    ) -> Self {
        Self {
            executor,
            reporter,
            shutdown_handle,
            config,
            http_client,
            value: Default::default(),
        }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn reporter(&self) -> Arc<Reporter> {
        self.reporter.clone()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn get_connection_string(&self) -> &str {
        &self.config.connection_string
    }

    pub fn http_client(&self) -> &HttpClientInstrumented {
        &self.http_client
    }

    /// Stop the run early. In-flight requests are cancelled and every virtual user stops after
    /// its current iteration.
    pub fn force_stop_scenario(&self) {
        log::info!("Scenario stop requested");
        self.shutdown_handle.shutdown();
    }

    pub(crate) fn shutdown_handle(&self) -> &ShutdownHandle {
        &self.shutdown_handle
    }

    pub fn get_mut(&mut self) -> &mut RV {
        &mut self.value
    }

    pub fn get(&self) -> &RV {
        &self.value
    }
}

/// The isolated context handed to every hook and iteration of one virtual user.
pub struct VuContext<RV: UserValuesConstraint, V: UserValuesConstraint> {
    vu_id: String,
    iteration: u64,
    runner_context: Arc<RunnerContext<RV>>,
    shutdown_listener: DelegatedShutdownListener,
    value: V,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> VuContext<RV, V> {
    pub(crate) fn new(
        vu_id: String,
        runner_context: Arc<RunnerContext<RV>>,
        shutdown_listener: DelegatedShutdownListener,
    ) -> Self {
        Self {
            vu_id,
            iteration: 0,
            runner_context,
            shutdown_listener,
            value: Default::default(),
        }
    }

    /// A value that is unique to this virtual user within the run, such as `vu-3`.
    pub fn vu_id(&self) -> &str {
        &self.vu_id
    }

    /// Zero based index of the iteration currently running.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub(crate) fn next_iteration(&mut self) {
        self.iteration += 1;
    }

    pub fn runner_context(&self) -> &Arc<RunnerContext<RV>> {
        &self.runner_context
    }

    pub fn shutdown_listener(&mut self) -> &mut DelegatedShutdownListener {
        &mut self.shutdown_listener
    }

    /// Build a URL for `path` on the service under test.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.runner_context.get_connection_string().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Issue a GET from this virtual user, blocking only this virtual user until it completes.
    ///
    /// If the run shuts down while the request is in flight the request is dropped and
    /// [TransportError::Cancelled] is returned.
    pub fn http_get(&self, url: &str) -> HttpResult {
        let client = self.runner_context.http_client();
        self.runner_context
            .executor()
            .execute_in_place(async { Ok(client.get(url).await) })
            .unwrap_or(Err(TransportError::Cancelled))
    }

    /// Pause this virtual user, for pacing between requests. Other virtual users are not affected.
    ///
    /// Returns early with an error if the run shuts down during the pause.
    pub fn sleep(&self, duration: Duration) -> anyhow::Result<()> {
        self.runner_context.executor().execute_in_place(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
    }

    pub fn get_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub fn get(&self) -> &V {
        &self.value
    }
}
