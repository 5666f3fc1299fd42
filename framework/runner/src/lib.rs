mod check;
mod cli;
mod config;
mod context;
mod definition;
mod executor;
mod http;
mod init;
mod outcome;
mod progress;
mod run;
mod scheduler;
mod shutdown;
mod types;
mod vu;

pub mod prelude {
    pub use crate::check::{check, Check};
    pub use crate::cli::{ReporterOpt, SurgeScenarioCli};
    pub use crate::config::{load_declaration_file, DeclarationFile};
    pub use crate::context::{RunnerContext, UserValuesConstraint, VuContext};
    pub use crate::definition::{HookResult, RunConfig, ScenarioDefinitionBuilder};
    pub use crate::executor::Executor;
    pub use crate::http::{status_of, status_was, HttpClientInstrumented, HttpResponse, HttpResult};
    pub use crate::outcome::IterationOutcome;
    pub use crate::run::run;
    pub use crate::scheduler::{Population, PopulationChange, RampScheduler, SchedulerState};
    pub use crate::types::SurgeResult;

    pub use surge_core::prelude::{
        DeclarationError, RampProfile, SchedulerFault, ShutdownSignalError, Stage, StageOptions,
        TransportError,
    };
    pub use surge_instruments::{CheckResult, OperationRecord, Reporter};
    pub use surge_summary_model::{CheckSummary, RunSummary};
}
