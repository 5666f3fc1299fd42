use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::collections::BTreeMap;
use std::io::{BufRead, Read, Write};
use std::path::PathBuf;

/// One stage of the ramp that was run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageSummary {
    pub duration_ms: u64,
    pub target: usize,
}

/// Pass and fail counts for one named check
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckSummary {
    pub passes: u64,
    pub fails: u64,
}

/// Summary of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// The unique run id
    ///
    /// Chosen by the runner unless one is passed on the command line.
    pub run_id: String,
    /// The name of the scenario that was run
    pub scenario_name: String,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// Length of the ramp, which is the sum of the stage durations, in milliseconds
    ///
    /// The run itself takes a little longer because virtual users finish their last iteration
    /// after the ramp is over.
    pub ramp_duration_ms: u64,
    /// The stages the run was configured with, after command line and file overrides
    pub stages: Vec<StageSummary>,
    /// The largest number of virtual users that were running at the same time
    pub peak_vus: usize,
    /// Iterations that ran to completion
    pub iterations: u64,
    /// Iterations that were cut short by a shutdown
    pub interrupted_iterations: u64,
    /// Check results by check name
    pub checks: BTreeMap<String, CheckSummary>,
    /// The version of Surge that was used for this run
    pub surge_version: String,
}

impl RunSummary {
    /// Create a new run summary with no results yet
    pub fn new(
        run_id: String,
        scenario_name: String,
        started_at: i64,
        stages: Vec<StageSummary>,
        surge_version: String,
    ) -> Self {
        Self {
            run_id,
            scenario_name,
            started_at,
            ramp_duration_ms: stages.iter().map(|s| s.duration_ms).sum(),
            stages,
            peak_vus: 0,
            iterations: 0,
            interrupted_iterations: 0,
            checks: BTreeMap::new(),
            surge_version,
        }
    }

    pub fn set_peak_vus(&mut self, peak_vus: usize) {
        self.peak_vus = peak_vus;
    }

    pub fn set_iterations(&mut self, iterations: u64, interrupted_iterations: u64) {
        self.iterations = iterations;
        self.interrupted_iterations = interrupted_iterations;
    }

    pub fn add_check(&mut self, name: String, summary: CheckSummary) {
        self.checks.insert(name, summary);
    }

    /// Total checks that passed across all check names
    pub fn checks_passed(&self) -> u64 {
        self.checks.values().map(|c| c.passes).sum()
    }

    /// Total checks that failed across all check names
    pub fn checks_failed(&self) -> u64 {
        self.checks.values().map(|c| c.fails).sum()
    }

    /// Compute a fingerprint for this run summary
    ///
    /// The fingerprint is intended to uniquely identify the configuration used to run the scenario.
    /// It uses the
    ///     - Scenario name
    ///     - Stages
    ///     - Surge version
    ///
    /// Results are not included, so two runs of the same configuration share a fingerprint.
    ///
    /// The fingerprint is computed using [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.scenario_name.as_bytes());
        self.stages.iter().for_each(|stage| {
            Digest::update(&mut hasher, stage.duration_ms.to_le_bytes());
            Digest::update(&mut hasher, (stage.target as u64).to_le_bytes());
        });
        Digest::update(&mut hasher, self.surge_version.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

/// Append the run summary to a file
///
/// The summary will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_summary(run_summary: &RunSummary, path: PathBuf) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_run_summary(run_summary, &mut file)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Serialize the run summary to a writer
pub fn store_run_summary<W: Write>(run_summary: &RunSummary, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, run_summary)?;
    Ok(())
}

/// Load a run summary from a reader
pub fn load_run_summary<R: Read>(reader: R) -> anyhow::Result<RunSummary> {
    let reader = std::io::BufReader::new(reader);
    let run_summary: RunSummary = serde_json::from_reader(reader)?;
    Ok(run_summary)
}

/// Load run summaries from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_run_summary].
pub fn load_summary_runs(path: PathBuf) -> anyhow::Result<Vec<RunSummary>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let run: RunSummary = serde_json::from_str(&line)?;
        runs.push(run);
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample(run_id: &str) -> RunSummary {
        RunSummary::new(
            run_id.to_string(),
            "http_get".to_string(),
            1_700_000_000,
            vec![
                StageSummary {
                    duration_ms: 15_000,
                    target: 500,
                },
                StageSummary {
                    duration_ms: 90_000,
                    target: 500,
                },
                StageSummary {
                    duration_ms: 15_000,
                    target: 0,
                },
            ],
            "0.1.0".to_string(),
        )
    }

    #[test]
    fn ramp_duration_is_sum_of_stages() {
        assert_eq!(120_000, sample("a").ramp_duration_ms);
    }

    #[test]
    fn fingerprint_ignores_run_id_and_results() {
        let first = sample("a");
        let mut second = sample("b");
        second.set_iterations(10, 2);
        second.add_check(
            "status was 200".to_string(),
            CheckSummary {
                passes: 9,
                fails: 1,
            },
        );

        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn fingerprint_changes_with_stages() {
        let first = sample("a");
        let mut second = sample("a");
        second.stages[1].target = 400;

        assert_ne!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn append_and_load_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");

        let mut first = sample("a");
        first.set_peak_vus(500);
        append_run_summary(&first, path.clone()).unwrap();
        append_run_summary(&sample("b"), path.clone()).unwrap();

        let runs = load_summary_runs(path).unwrap();
        assert_eq!(vec![first, sample("b")], runs);
    }
}
