use super::{Dispatch, ReportContext, Reporter, ReporterFactory, Services, TextReporter};
use crate::config::{Format, ReportConfig, WebhookConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;

/// Splits `text` into chunks of at most `max` chars, preferring line
/// boundaries. `max == 0` disables splitting.
fn chunk_text(text: &str, max: usize) -> Vec<String> {
    if max == 0 || text.chars().count() <= max {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;
    for mut line in text.lines() {
        loop {
            let line_len = line.chars().count();
            let needed = if current.is_empty() { line_len } else { line_len + 1 };
            if current_len + needed <= max {
                current.push(line);
                current_len += needed;
                break;
            }
            if !current.is_empty() {
                chunks.push(current.join("\n"));
                current.clear();
                current_len = 0;
                continue;
            }
            // a single line longer than a whole chunk
            let idx = line
                .char_indices()
                .nth(max)
                .map_or(line.len(), |(i, _)| i);
            chunks.push(line[..idx].to_string());
            line = &line[idx..];
        }
    }
    if !current.is_empty() {
        chunks.push(current.join("\n"));
    }
    chunks
}

/// Reporter posting the text report to a Slack-compatible incoming webhook.
///
/// Long reports are split into several messages of at most
/// `max_message_length` chars each.
pub struct WebhookReporter<'a> {
    ctx: ReportContext<'a>,
    config: &'a WebhookConfig,
    url: &'a str,
    client: &'a reqwest::Client,
}

impl<'a> WebhookReporter<'a> {
    /// Fails when no `webhook_url` is configured.
    pub fn new(ctx: ReportContext<'a>, client: &'a reqwest::Client) -> Result<Self> {
        let config = &ctx.config().webhook;
        let url = config
            .webhook_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .context("webhook reporter is enabled but `webhook_url` is not set")?;
        Ok(Self {
            ctx,
            config,
            url,
            client,
        })
    }

    async fn post(&self, chunk: &str) -> bool {
        let result = self
            .client
            .post(self.url)
            .timeout(self.config.timeout)
            .json(&serde_json::json!({ "text": chunk }))
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!("Webhook rejected message: {}", response.status());
                false
            }
            Err(e) => {
                tracing::warn!("Failed to post to webhook: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl Reporter for WebhookReporter<'_> {
    async fn submit(&self) -> Result<Option<Dispatch>> {
        let Some(lines) = TextReporter::new(self.ctx).render_lines() else {
            return Ok(None);
        };
        let chunks = chunk_text(&lines.join("\n"), self.config.max_message_length);
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            tracing::debug!("Posting webhook message {}/{}", i + 1, total);
            // later chunks would arrive without their context
            if !self.post(chunk).await {
                return Ok(Some(Dispatch::Sent(false)));
            }
        }
        Ok(Some(Dispatch::Sent(true)))
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

pub struct WebhookFactory;

impl ReporterFactory for WebhookFactory {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn enabled(&self, config: &ReportConfig) -> bool {
        config.webhook.enabled
    }

    fn base_format(&self, _config: &ReportConfig) -> Format {
        Format::Text
    }

    fn build<'a>(
        &self,
        ctx: ReportContext<'a>,
        services: &'a Services,
    ) -> Result<Box<dyn Reporter + 'a>> {
        Ok(Box::new(WebhookReporter::new(ctx, &services.http)?))
    }
}
