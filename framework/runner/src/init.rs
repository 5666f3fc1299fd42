use crate::cli::SurgeScenarioCli;
use clap::Parser;

/// Initialise the CLI and logging for the surge runner.
pub fn init() -> SurgeScenarioCli {
    env_logger::init();

    SurgeScenarioCli::parse()
}
