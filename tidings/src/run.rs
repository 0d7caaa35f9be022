/// Recorded runs
///
/// The binary replays a run stored as JSON instead of fetching anything
/// itself. A record lists every job with its verb and snapshots:
///
/// ```json
/// {
///   "duration": "1s 200ms",
///   "jobs": [
///     { "job": { "name": "Docs", "location": "https://example.com" },
///       "verb": "changed", "old": "a\n", "new": "b\n" }
///   ]
/// }
/// ```
use crate::{
    config::parse_duration,
    job::{Job, JobState, StaticJob, Verb},
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::{path::Path, sync::Arc, time::Duration};

#[derive(Debug, Clone, Deserialize)]
pub struct RecordedJob {
    pub job: StaticJob,
    pub verb: Verb,
    #[serde(default)]
    pub old: Option<String>,
    #[serde(default)]
    pub new: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub traceback: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl RecordedJob {
    pub fn into_state(self) -> Result<JobState> {
        let name = self.job.pretty_name();
        let job: Arc<dyn Job> = Arc::new(self.job);
        let state = match self.verb {
            Verb::New => JobState::new(job, self.new),
            Verb::Changed => {
                let old = self
                    .old
                    .with_context(|| format!("changed job '{}' has no old data", name))?;
                JobState::changed(job, old, self.new)
            }
            Verb::Unchanged => JobState::unchanged(job, self.new),
            Verb::Unmodified => JobState::unmodified(job, self.new),
            Verb::Error => {
                let message = self
                    .error
                    .with_context(|| format!("failed job '{}' has no error message", name))?;
                JobState::error(job, message, self.traceback)
            }
        };
        Ok(match self.timestamp {
            Some(timestamp) => state.with_timestamp(timestamp),
            None => state,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunRecord {
    #[serde(default, deserialize_with = "parse_duration")]
    pub duration: Duration,
    pub jobs: Vec<RecordedJob>,
}

impl RunRecord {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run record: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse run record: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Job states in recorded order.
    pub fn into_job_states(self) -> Result<Vec<JobState>> {
        self.jobs.into_iter().map(RecordedJob::into_state).collect()
    }
}
