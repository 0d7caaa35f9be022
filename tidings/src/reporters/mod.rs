mod apprise;
mod html;
mod markdown;
mod stdout;
mod text;
mod webhook;

use crate::{
    config::{Format, ReportConfig},
    delivery::DeliveryBackend,
    job::{Job, JobState, Verb},
    report::Report,
};
use anyhow::{Result, bail};
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};

pub use apprise::{AppriseFactory, AppriseReporter, render_subject};
pub use html::HtmlReporter;
pub use markdown::MarkdownReporter;
pub use stdout::{StdoutFactory, StdoutReporter};
pub use text::TextReporter;
pub use webhook::{WebhookFactory, WebhookReporter};

/// What a reporter did with its job states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The report body, for reporters that only render.
    Rendered(String),
    /// Handed to a channel; `false` when the channel rejected it.
    Sent(bool),
    /// The channel's delivery backend is not installed.
    Unavailable,
}

/// Everything a reporter reads during one `submit` call.
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    pub report: &'a Report,
    pub job_states: &'a [JobState],
    /// Run duration, for display only.
    pub duration: Duration,
}

impl<'a> ReportContext<'a> {
    pub fn new(report: &'a Report, job_states: &'a [JobState], duration: Duration) -> Self {
        Self {
            report,
            job_states,
            duration,
        }
    }

    pub fn config(&self) -> &'a ReportConfig {
        &self.report.config().report
    }

    /// Job states surviving the display policy, in order.
    pub fn filtered(&self) -> Vec<&'a JobState> {
        self.report.filtered(self.job_states)
    }

    fn watched_line(&self) -> String {
        format!(
            "watched {} jobs in {}",
            self.job_states.len(),
            humantime::format_duration(self.duration)
        )
    }
}

/// Trait for different reporting mechanisms.
///
/// Reporters render or deliver the job states of a report. `Ok(None)` means
/// nothing survived the display policy and no output was produced.
#[async_trait]
pub trait Reporter: Send + Sync {
    async fn submit(&self) -> Result<Option<Dispatch>>;

    /// Returns the name of this reporter for logging purposes.
    fn name(&self) -> &'static str;
}

/// Capabilities injected into channel reporters.
#[derive(Clone, Default)]
pub struct Services {
    pub apprise: Option<Arc<dyn DeliveryBackend>>,
    pub http: reqwest::Client,
}

/// Builds one kind of channel reporter from configuration.
pub trait ReporterFactory: Send + Sync {
    fn name(&self) -> &'static str;

    fn enabled(&self, config: &ReportConfig) -> bool;

    /// Format section (`[report.text]` etc.) whose shared knobs, such as
    /// `separate`, apply to this channel.
    fn base_format(&self, config: &ReportConfig) -> Format;

    fn build<'a>(
        &self,
        ctx: ReportContext<'a>,
        services: &'a Services,
    ) -> Result<Box<dyn Reporter + 'a>>;
}

/// Renderer for a body format.
pub fn renderer_for<'a>(format: Format, ctx: ReportContext<'a>) -> Box<dyn Reporter + 'a> {
    match format {
        Format::Text => Box::new(TextReporter::new(ctx)),
        Format::Markdown => Box::new(MarkdownReporter::new(ctx)),
        Format::Html => Box::new(HtmlReporter::new(ctx)),
    }
}

/// Outcome of one reporter invocation.
#[derive(Debug)]
pub struct Submission {
    pub reporter: &'static str,
    pub outcome: Result<Option<Dispatch>>,
}

struct Entry {
    factory: Box<dyn ReporterFactory>,
    active: bool,
}

/// Ordered set of channel reporters.
pub struct ReporterRegistry {
    entries: Vec<Entry>,
    services: Services,
}

impl ReporterRegistry {
    pub fn new(services: Services) -> Self {
        Self {
            entries: Vec::new(),
            services,
        }
    }

    /// Registry with the stdout, webhook and apprise channels, in that order.
    pub fn builtin(services: Services) -> Self {
        let mut registry = Self::new(services);
        registry
            .register(StdoutFactory)
            .register(WebhookFactory)
            .register(AppriseFactory);
        registry
    }

    /// Adds a factory at the end, or replaces one with the same name in place.
    pub fn register(&mut self, factory: impl ReporterFactory + 'static) -> &mut Self {
        let entry = Entry {
            factory: Box::new(factory),
            active: true,
        };
        match self.position(entry.factory.name()) {
            Some(i) => self.entries[i] = entry,
            None => self.entries.push(entry),
        }
        self
    }

    /// Switches a registered reporter on or off regardless of its config.
    /// Returns `false` for unknown names.
    pub fn set_active(&mut self, name: &str, active: bool) -> bool {
        match self.position(name) {
            Some(i) => {
                self.entries[i].active = active;
                true
            }
            None => false,
        }
    }

    /// Moves the named reporters to the front, in the given order.
    pub fn prioritize(&mut self, names: &[&str]) {
        for name in names.iter().rev() {
            if let Some(i) = self.position(name) {
                let entry = self.entries.remove(i);
                self.entries.insert(0, entry);
            }
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.factory.name()).collect()
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.factory.name() == name)
    }

    pub fn build<'a>(&'a self, name: &str, ctx: ReportContext<'a>) -> Result<Box<dyn Reporter + 'a>> {
        match self.position(name) {
            Some(i) => self.entries[i].factory.build(ctx, &self.services),
            None => bail!("unknown reporter: {}", name),
        }
    }

    /// Runs every active, enabled reporter one after another.
    ///
    /// A reporter failing to build or submit is logged and recorded; the
    /// remaining reporters still run. Channels whose base format is
    /// `separate` get one submission per job state.
    pub async fn submit_all(&self, report: &Report, duration: Duration) -> Vec<Submission> {
        let config = &report.config().report;
        let mut any_enabled = false;
        let mut submissions = Vec::new();

        for entry in &self.entries {
            let factory = entry.factory.as_ref();
            if !entry.active || !factory.enabled(config) {
                continue;
            }
            any_enabled = true;
            tracing::info!("Submitting with {}", factory.name());

            if config.separate(factory.base_format(config)) {
                for state in report.job_states() {
                    let ctx = ReportContext::new(report, std::slice::from_ref(state), duration);
                    submissions.push(self.submit_one(factory, ctx).await);
                }
            } else {
                let ctx = ReportContext::new(report, report.job_states(), duration);
                submissions.push(self.submit_one(factory, ctx).await);
            }
        }

        if !any_enabled {
            tracing::warn!("No reporters enabled.");
        }
        submissions
    }

    async fn submit_one<'a>(
        &'a self,
        factory: &dyn ReporterFactory,
        ctx: ReportContext<'a>,
    ) -> Submission {
        let name = factory.name();
        let outcome = match factory.build(ctx, &self.services) {
            Ok(reporter) => reporter.submit().await,
            Err(e) => Err(e.context(format!("failed to construct reporter '{}'", name))),
        };

        match &outcome {
            Ok(None) => tracing::debug!("{}: nothing to report", name),
            Ok(Some(Dispatch::Rendered(body))) => {
                tracing::debug!("{}: rendered {} bytes", name, body.len())
            }
            Ok(Some(dispatch)) => tracing::debug!("{}: {:?}", name, dispatch),
            Err(e) => tracing::warn!("Reporter '{}' failed: {:#}", name, e),
        }
        Submission {
            reporter: name,
            outcome,
        }
    }
}

/// Body shown under a job's heading.
pub(crate) enum Content<'a> {
    Failure(&'a str),
    Snapshot(&'a str),
    Diff,
}

pub(crate) fn content_of(state: &JobState) -> Option<Content<'_>> {
    match state.verb() {
        Verb::Error => {
            let detail = state.traceback().or(state.error_message()).unwrap_or_default();
            Some(Content::Failure(detail.trim()))
        }
        Verb::Unchanged => Some(Content::Snapshot(state.new_data())),
        _ => match state.old_data() {
            Some(old) if old != state.new_data() => Some(Content::Diff),
            _ => None,
        },
    }
}

/// `name` when it is the location itself, otherwise `name ( location )`.
pub(crate) fn plain_title(job: &dyn Job) -> String {
    let name = job.pretty_name();
    let location = job.location();
    if name == location {
        location
    } else {
        format!("{} ( {} )", name, location)
    }
}

pub(crate) fn signature() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
