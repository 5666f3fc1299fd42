use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use surge_core::prelude::{parse_duration, DeclarationError, RampProfile, StageOptions};

use crate::cli::{ReporterOpt, SurgeScenarioCli};
use crate::config::load_declaration_file;
use crate::context::{RunnerContext, UserValuesConstraint, VuContext};
use crate::outcome::IterationOutcome;

pub type HookResult = anyhow::Result<()>;

pub type GlobalHookMut<RV> = fn(&mut RunnerContext<RV>) -> HookResult;
pub type GlobalHook<RV> = fn(Arc<RunnerContext<RV>>) -> HookResult;
pub type VuHookMut<RV, V> = fn(&mut VuContext<RV, V>) -> HookResult;
pub type IterationFn<RV, V> = fn(&mut VuContext<RV, V>) -> IterationOutcome;

const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);

/// Run-wide settings, fixed before the first virtual user starts.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub scenario_name: String,
    pub run_id: String,
    /// Base URL of the service under test.
    pub connection_string: String,
    pub profile: RampProfile,
    /// How often the scheduler compares the running population to the ramp.
    pub tick: Duration,
    /// How long draining virtual users get before in-flight work is cancelled.
    pub graceful_stop: Duration,
    pub http_timeout: Duration,
}

/// The builder for a scenario definition.
///
/// This must be used at the start of a scenario to declare the ramp and the iteration that each
/// virtual user repeats.
pub struct ScenarioDefinitionBuilder<RV: UserValuesConstraint, V: UserValuesConstraint> {
    /// The name of the scenario, which should be unique within the test suite.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")`.
    name: String,
    /// This value is initialised for you and you cannot change it.
    #[doc(hidden)]
    cli: SurgeScenarioCli,
    /// The ramp declared by the scenario. Replaced by `--config` or `--stage` if given.
    default_stages: Vec<StageOptions>,
    default_graceful_stop: Duration,
    default_connection_string: Option<String>,
    /// Global setup hook for this scenario. It will be run once, before any virtual users are started.
    setup_fn: Option<GlobalHookMut<RV>>,
    /// Setup hook for a virtual user, run once as it starts and before its first iteration.
    setup_vu_fn: Option<VuHookMut<RV, V>>,
    /// The iteration each virtual user repeats until it is retired.
    iteration_fn: Option<IterationFn<RV, V>>,
    /// Teardown hook for a virtual user, run once after its last iteration.
    teardown_vu_fn: Option<VuHookMut<RV, V>>,
    /// Global teardown hook, run once after every virtual user has stopped.
    teardown_fn: Option<GlobalHook<RV>>,
}

pub struct ScenarioDefinition<RV: UserValuesConstraint, V: UserValuesConstraint> {
    pub config: Arc<RunConfig>,
    pub no_progress: bool,
    pub reporter: ReporterOpt,
    pub summary_file: Option<PathBuf>,
    pub setup_fn: Option<GlobalHookMut<RV>>,
    pub setup_vu_fn: Option<VuHookMut<RV, V>>,
    pub iteration_fn: IterationFn<RV, V>,
    pub teardown_vu_fn: Option<VuHookMut<RV, V>>,
    pub teardown_fn: Option<GlobalHook<RV>>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> ScenarioDefinitionBuilder<RV, V> {
    /// Initialise a new scenario definition from the scenario name and command line arguments.
    /// See the [ScenarioDefinitionBuilder::name] for more information about the name.
    pub fn new(name: &str, cli: SurgeScenarioCli) -> Self {
        Self {
            name: name.to_string(),
            cli,
            default_stages: Vec::new(),
            default_graceful_stop: DEFAULT_GRACEFUL_STOP,
            default_connection_string: None,
            setup_fn: None,
            setup_vu_fn: None,
            iteration_fn: None,
            teardown_vu_fn: None,
            teardown_fn: None,
        }
    }

    /// Parse the command line, set up logging, then call [ScenarioDefinitionBuilder::new].
    pub fn new_with_init(name: &str) -> Self {
        Self::new(name, crate::init::init())
    }

    /// Declare the ramp for this scenario.
    pub fn with_stages(mut self, stages: Vec<StageOptions>) -> Self {
        self.default_stages = stages;
        self
    }

    pub fn with_default_graceful_stop(mut self, graceful_stop: Duration) -> Self {
        self.default_graceful_stop = graceful_stop;
        self
    }

    /// Used when `--connection-string` is not given on the command line.
    pub fn with_default_connection_string(mut self, connection_string: &str) -> Self {
        self.default_connection_string = Some(connection_string.to_string());
        self
    }

    /// Set the global setup hook [ScenarioDefinitionBuilder::setup_fn] for this scenario.
    pub fn use_setup(mut self, setup_fn: GlobalHookMut<RV>) -> Self {
        self.setup_fn = Some(setup_fn);
        self
    }

    /// Set the virtual user setup hook [ScenarioDefinitionBuilder::setup_vu_fn] for this scenario.
    pub fn use_vu_setup(mut self, setup_vu_fn: VuHookMut<RV, V>) -> Self {
        self.setup_vu_fn = Some(setup_vu_fn);
        self
    }

    /// Set the iteration [ScenarioDefinitionBuilder::iteration_fn] for this scenario.
    pub fn use_iteration(mut self, iteration_fn: IterationFn<RV, V>) -> Self {
        self.iteration_fn = Some(iteration_fn);
        self
    }

    /// Set the virtual user teardown hook [ScenarioDefinitionBuilder::teardown_vu_fn] for this scenario.
    pub fn use_vu_teardown(mut self, teardown_vu_fn: VuHookMut<RV, V>) -> Self {
        self.teardown_vu_fn = Some(teardown_vu_fn);
        self
    }

    /// Set the global teardown hook [ScenarioDefinitionBuilder::teardown_fn] for this scenario.
    ///
    /// This hook is best effort, a failure is logged but does not fail the run.
    pub fn use_teardown(mut self, teardown_fn: GlobalHook<RV>) -> Self {
        self.teardown_fn = Some(teardown_fn);
        self
    }

    /// Resolve stages and options from the command line, the declaration file and the scenario,
    /// in that order of precedence, and validate them.
    pub(crate) fn build(self) -> Result<ScenarioDefinition<RV, V>, DeclarationError> {
        let iteration_fn = self
            .iteration_fn
            .ok_or_else(|| DeclarationError::MissingIteration {
                scenario: self.name.clone(),
            })?;

        let file = match &self.cli.config {
            Some(path) => Some(load_declaration_file(path)?),
            None => None,
        };

        let stages = if !self.cli.stage.is_empty() {
            log::info!("Using {} stage(s) from the command line", self.cli.stage.len());
            self.cli.stage.clone()
        } else if let Some(file) = file.as_ref().filter(|f| !f.stages.is_empty()) {
            log::info!("Using {} stage(s) from the declaration file", file.stages.len());
            file.stages.clone()
        } else {
            self.default_stages.clone()
        };
        let profile = RampProfile::from_options(&stages)?;

        let graceful_stop = match (
            self.cli.graceful_stop,
            file.as_ref().and_then(|f| f.graceful_stop.as_ref()),
        ) {
            (Some(graceful_stop), _) => graceful_stop,
            (None, Some(value)) => {
                parse_duration(value).map_err(|reason| DeclarationError::InvalidFile {
                    path: self
                        .cli
                        .config
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default(),
                    reason: format!("graceful_stop `{value}`: {reason}"),
                })?
            }
            (None, None) => self.default_graceful_stop,
        };

        let connection_string = self
            .cli
            .connection_string
            .clone()
            .or(self.default_connection_string.clone())
            .unwrap_or_default();
        url::Url::parse(&connection_string).map_err(|e| {
            DeclarationError::InvalidConnectionString {
                value: connection_string.clone(),
                reason: e.to_string(),
            }
        })?;

        let run_id = self
            .cli
            .run_id
            .clone()
            .unwrap_or_else(|| nanoid::nanoid!());

        Ok(ScenarioDefinition {
            config: Arc::new(RunConfig {
                scenario_name: self.name,
                run_id,
                connection_string,
                profile,
                tick: Duration::from_millis(self.cli.tick_ms.max(1)),
                graceful_stop,
                http_timeout: Duration::from_secs(self.cli.http_timeout_s.max(1)),
            }),
            no_progress: self.cli.no_progress,
            reporter: self.cli.reporter,
            summary_file: self.cli.summary_file,
            setup_fn: self.setup_fn,
            setup_vu_fn: self.setup_vu_fn,
            iteration_fn,
            teardown_vu_fn: self.teardown_vu_fn,
            teardown_fn: self.teardown_fn,
        })
    }
}
