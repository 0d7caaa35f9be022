/// Report module for the tidings reporting core
///
/// A `Report` collects the job states of one run together with the active
/// configuration. It is the unit every reporter receives; reporters only
/// ever see it through shared references.
use crate::{
    config::Config,
    job::JobState,
    reporters::{ReporterRegistry, Submission},
};
use std::{sync::Arc, time::Duration};

#[derive(Debug)]
pub struct Report {
    config: Arc<Config>,
    job_states: Vec<JobState>,
}

impl Report {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            job_states: Vec::new(),
        }
    }

    pub fn with_job_states(config: Arc<Config>, job_states: Vec<JobState>) -> Self {
        Self { config, job_states }
    }

    /// Appends the outcome of one job, in job definition order.
    pub fn record(&mut self, state: JobState) {
        tracing::debug!(
            "{}: {} ({})",
            state.verb().label(),
            state.job().pretty_name(),
            state.timestamp().to_rfc3339()
        );
        self.job_states.push(state);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn job_states(&self) -> &[JobState] {
        &self.job_states
    }

    /// The subset of `states` the display policy lets through.
    pub fn filtered<'a>(&self, states: &'a [JobState]) -> Vec<&'a JobState> {
        self.config.display.select(states)
    }

    /// Hands the finished report to every enabled reporter.
    pub async fn finish(&self, registry: &ReporterRegistry, duration: Duration) -> Vec<Submission> {
        tracing::info!(
            "Run finished with {} job states in {}",
            self.job_states.len(),
            humantime::format_duration(duration)
        );
        registry.submit_all(self, duration).await
    }
}
