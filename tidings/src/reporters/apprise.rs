use super::{Dispatch, ReportContext, Reporter, ReporterFactory, Services, renderer_for};
use crate::{
    config::{AppriseConfig, Format, ReportConfig},
    delivery::{DeliveryBackend, Notification, NotifyClient, NotifyFormat, Target},
};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;

/// Expands `{count}` and `{jobs}` in a subject template. Other brace text is
/// kept verbatim and substituted values are never expanded again.
pub fn render_subject(template: &str, count: usize, jobs: &str) -> String {
    let mut out = String::with_capacity(template.len() + jobs.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{count}") {
            out.push_str(&count.to_string());
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{jobs}") {
            out.push_str(jobs);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

/// Fan-out reporter: one notification, rendered in the configured format,
/// delivered to every configured Apprise target.
pub struct AppriseReporter<'a> {
    ctx: ReportContext<'a>,
    config: &'a AppriseConfig,
    format: Format,
    backend: Option<&'a dyn DeliveryBackend>,
}

impl<'a> AppriseReporter<'a> {
    /// Fails when no `format` is configured.
    pub fn new(ctx: ReportContext<'a>, backend: Option<&'a dyn DeliveryBackend>) -> Result<Self> {
        let config = &ctx.config().apprise;
        let format = config
            .format
            .context("apprise reporter is enabled but `format` is not set")?;
        Ok(Self {
            ctx,
            config,
            format,
            backend,
        })
    }
}

#[async_trait]
impl Reporter for AppriseReporter<'_> {
    async fn submit(&self) -> Result<Option<Dispatch>> {
        let states = self.ctx.filtered();
        if states.is_empty() {
            return Ok(None);
        }

        let Some(backend) = self.backend else {
            tracing::warn!("apprise is not installed, skipping notification");
            return Ok(Some(Dispatch::Unavailable));
        };

        if self.config.urls.is_empty() && self.config.config_urls.is_empty() {
            tracing::warn!("No apprise urls or config_urls configured");
        }

        let mut client = backend.create_client();
        for url in &self.config.urls {
            client.add(Target::Url(url.clone()));
        }
        for url in &self.config.config_urls {
            client.add(Target::Config(url.clone()));
        }

        let format = self.format;
        let body = match renderer_for(format, self.ctx).submit().await? {
            Some(Dispatch::Rendered(body)) => body,
            other => bail!("{:?} renderer produced no body: {:?}", format, other),
        };

        let jobs = states
            .iter()
            .map(|s| s.job().pretty_name())
            .collect::<Vec<_>>()
            .join(", ");
        let notification = Notification {
            title: render_subject(&self.config.subject, states.len(), &jobs),
            body,
            format: NotifyFormat::from(format),
        };

        tracing::debug!(
            "Notifying {} apprise targets: {}",
            self.config.urls.len() + self.config.config_urls.len(),
            notification.title
        );
        let sent = client.notify(&notification).await;
        if !sent {
            tracing::warn!("apprise failed to deliver '{}'", notification.title);
        }
        Ok(Some(Dispatch::Sent(sent)))
    }

    fn name(&self) -> &'static str {
        "apprise"
    }
}

pub struct AppriseFactory;

impl ReporterFactory for AppriseFactory {
    fn name(&self) -> &'static str {
        "apprise"
    }

    fn enabled(&self, config: &ReportConfig) -> bool {
        config.apprise.enabled
    }

    fn base_format(&self, config: &ReportConfig) -> Format {
        config.apprise.format.unwrap_or_default()
    }

    fn build<'a>(
        &self,
        ctx: ReportContext<'a>,
        services: &'a Services,
    ) -> Result<Box<dyn Reporter + 'a>> {
        Ok(Box::new(AppriseReporter::new(ctx, services.apprise.as_deref())?))
    }
}
