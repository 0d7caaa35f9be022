/// Job model for the tidings reporting core
///
/// A `JobState` is the outcome of evaluating one monitored job in one run.
/// Jobs themselves are defined elsewhere; this module only needs the small
/// `Job` capability to name and locate them.
use crate::diff::{DiffRenderer, DiffStyle, Markup};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::{Arc, OnceLock},
};

/// Number of unchanged lines shown around each change.
pub const DEFAULT_CONTEXT_LINES: usize = 3;

/// Classification of what happened to a job during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    New,
    Changed,
    Unchanged,
    Error,
    Unmodified,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::New => "new",
            Verb::Changed => "changed",
            Verb::Unchanged => "unchanged",
            Verb::Error => "error",
            Verb::Unmodified => "unmodified",
        }
    }

    /// Upper-case label used in report headings, e.g. `CHANGED`.
    pub fn label(&self) -> String {
        self.as_str().to_uppercase()
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A monitored source, as far as reporting is concerned.
pub trait Job: Send + Sync + fmt::Debug {
    /// Human-friendly name of the job.
    fn pretty_name(&self) -> String;

    /// Where the job reads from (URL, command line, ...).
    fn location(&self) -> String;

    fn location_is_url(&self) -> bool {
        let location = self.location();
        location.starts_with("http://") || location.starts_with("https://")
    }

    fn context_lines(&self) -> usize {
        DEFAULT_CONTEXT_LINES
    }
}

/// A job described by plain data, e.g. loaded from a recorded run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticJob {
    #[serde(default)]
    pub name: Option<String>,
    pub location: String,
    #[serde(default = "StaticJob::default_context_lines")]
    pub context_lines: usize,
}

impl StaticJob {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            name: None,
            location: location.into(),
            context_lines: DEFAULT_CONTEXT_LINES,
        }
    }

    pub fn named(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(location)
        }
    }

    fn default_context_lines() -> usize {
        DEFAULT_CONTEXT_LINES
    }
}

impl Job for StaticJob {
    fn pretty_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.location.clone())
    }

    fn location(&self) -> String {
        self.location.clone()
    }

    fn context_lines(&self) -> usize {
        self.context_lines
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Failure {
    message: String,
    traceback: Option<String>,
}

/// Outcome of one job in one run.
///
/// Created once per job per run and never mutated afterwards; the only
/// late-bound part is the unified diff, computed on first use and cached.
#[derive(Debug)]
pub struct JobState {
    job: Arc<dyn Job>,
    verb: Verb,
    old_data: Option<String>,
    new_data: String,
    timestamp: DateTime<Utc>,
    failure: Option<Failure>,
    diff: OnceLock<String>,
}

impl JobState {
    fn build(
        job: Arc<dyn Job>,
        verb: Verb,
        old_data: Option<String>,
        new_data: String,
        failure: Option<Failure>,
    ) -> Self {
        Self {
            job,
            verb,
            old_data,
            new_data,
            timestamp: Utc::now(),
            failure,
            diff: OnceLock::new(),
        }
    }

    /// A job seen for the first time.
    pub fn new(job: Arc<dyn Job>, data: impl Into<String>) -> Self {
        Self::build(job, Verb::New, None, data.into(), None)
    }

    /// Content differs from the previous run. `old` and `new` may still be
    /// equal, e.g. when the upstream comparison ignores whitespace.
    pub fn changed(job: Arc<dyn Job>, old: impl Into<String>, new: impl Into<String>) -> Self {
        Self::build(job, Verb::Changed, Some(old.into()), new.into(), None)
    }

    pub fn unchanged(job: Arc<dyn Job>, data: impl Into<String>) -> Self {
        let data = data.into();
        Self::build(job, Verb::Unchanged, Some(data.clone()), data, None)
    }

    /// The source reported "not modified" without sending content.
    pub fn unmodified(job: Arc<dyn Job>, data: impl Into<String>) -> Self {
        let data = data.into();
        Self::build(job, Verb::Unmodified, Some(data.clone()), data, None)
    }

    pub fn error(job: Arc<dyn Job>, message: impl Into<String>, traceback: Option<String>) -> Self {
        let failure = Failure {
            message: message.into(),
            traceback,
        };
        Self::build(job, Verb::Error, None, String::new(), Some(failure))
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn job(&self) -> &dyn Job {
        self.job.as_ref()
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn old_data(&self) -> Option<&str> {
        self.old_data.as_deref()
    }

    pub fn new_data(&self) -> &str {
        &self.new_data
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn error_message(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.message.as_str())
    }

    pub fn traceback(&self) -> Option<&str> {
        self.failure.as_ref().and_then(|f| f.traceback.as_deref())
    }

    /// Plain unified diff between the old and new snapshot. Empty when
    /// both render identically.
    pub fn diff(&self) -> &str {
        self.diff.get_or_init(|| {
            DiffRenderer::new(DiffStyle::Unified, Markup::Plain)
                .context_lines(self.job.context_lines())
                .render(self.old_data.as_deref().unwrap_or_default(), &self.new_data)
        })
    }

    /// Diff in the given style and markup. The plain unified form comes
    /// from the cache.
    pub fn render_diff(&self, style: DiffStyle, markup: Markup) -> String {
        if style == DiffStyle::Unified && markup == Markup::Plain {
            return self.diff().to_owned();
        }
        DiffRenderer::new(style, markup)
            .context_lines(self.job.context_lines())
            .render(self.old_data.as_deref().unwrap_or_default(), &self.new_data)
    }
}
