use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use surge_core::prelude::{parse_duration, StageOptions};

#[derive(Debug, Clone, Parser)]
#[command(about, long_about = None)]
pub struct SurgeScenarioCli {
    /// Base URL of the service to test, for example `http://localhost:8080`
    #[clap(short, long)]
    pub connection_string: Option<String>,

    /// Override the ramp with one or more stages in the format `duration:target`. For example
    /// `--stage 15s:500 --stage 1m30s:500 --stage 15s:0`.
    ///
    /// Stages given here replace both the stages declared by the scenario and any stages in a
    /// declaration file.
    #[clap(long, short, value_parser = parse_stage)]
    pub stage: Vec<StageOptions>,

    /// Load stages and options from a declaration file. The format is chosen by extension and may
    /// be `.toml`, `.yaml`, `.yml` or `.json`.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// How long virtual users may keep running their last iteration once the ramp is over before
    /// their in-flight requests are cancelled, for example `30s`
    #[clap(long, value_parser = parse_duration_arg)]
    pub graceful_stop: Option<Duration>,

    /// How often the scheduler re-evaluates the target number of virtual users, in milliseconds
    #[clap(long, default_value = "100")]
    pub tick_ms: u64,

    /// Timeout applied to each HTTP request, in seconds
    #[clap(long, default_value = "60")]
    pub http_timeout_s: u64,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// Where to send results while the scenario runs
    #[clap(long, value_enum, default_value_t = ReporterOpt::InMemory)]
    pub reporter: ReporterOpt,

    /// Append a JSON summary of the run to this file
    #[clap(long)]
    pub summary_file: Option<PathBuf>,

    /// Use this id for the run instead of generating one
    #[clap(long)]
    pub run_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReporterOpt {
    /// Keep results in memory and print summary tables at the end of the run
    #[default]
    InMemory,
    /// Only keep the totals needed for the run summary
    Noop,
}

fn parse_stage(s: &str) -> anyhow::Result<StageOptions> {
    Ok(s.parse::<StageOptions>()?)
}

fn parse_duration_arg(s: &str) -> anyhow::Result<Duration> {
    parse_duration(s).map_err(|e| anyhow::anyhow!("Invalid duration `{}`: {}", s, e))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_repeated_stages() {
        let cli = SurgeScenarioCli::try_parse_from([
            "http_get",
            "--stage",
            "15s:500",
            "--stage",
            "1m30s:500",
            "-s",
            "15s:0",
            "--graceful-stop",
            "5s",
        ])
        .unwrap();

        assert_eq!(
            vec![
                StageOptions::new("15s", 500),
                StageOptions::new("1m30s", 500),
                StageOptions::new("15s", 0),
            ],
            cli.stage
        );
        assert_eq!(Some(Duration::from_secs(5)), cli.graceful_stop);
        assert_eq!(100, cli.tick_ms);
        assert_eq!(ReporterOpt::InMemory, cli.reporter);
    }

    #[test]
    fn rejects_malformed_stage() {
        assert!(SurgeScenarioCli::try_parse_from(["http_get", "--stage", "15s"]).is_err());
    }
}
