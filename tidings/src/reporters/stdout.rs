use super::{Dispatch, ReportContext, Reporter, ReporterFactory, Services, TextReporter};
use crate::config::{Format, ReportConfig, StdoutConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, stdout};

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const BLUE: &str = "\x1b[34m";

fn is_rule(line: &str) -> bool {
    !line.is_empty() && (line.chars().all(|c| c == '=') || line.chars().all(|c| c == '-'))
}

fn is_summary(line: &str) -> bool {
    let bytes = line.as_bytes();
    bytes.len() > 4 && bytes[..2].iter().all(u8::is_ascii_digit) && &bytes[2..4] == b". "
}

/// Wraps diff and structure lines of a text report in ANSI colors.
pub fn colorize(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            let color = if is_rule(line) || line == "-- " {
                DIM
            } else if is_summary(line) {
                BOLD
            } else if line.starts_with("@@") {
                BLUE
            } else if line.starts_with('+') {
                GREEN
            } else if line.starts_with('-') {
                RED
            } else {
                return line.to_string();
            };
            format!("{}{}{}", color, line, RESET)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reporter that prints the text report to stdout.
pub struct StdoutReporter<'a> {
    ctx: ReportContext<'a>,
    config: &'a StdoutConfig,
}

impl<'a> StdoutReporter<'a> {
    pub fn new(ctx: ReportContext<'a>) -> Self {
        Self {
            config: &ctx.config().stdout,
            ctx,
        }
    }
}

#[async_trait]
impl Reporter for StdoutReporter<'_> {
    async fn submit(&self) -> Result<Option<Dispatch>> {
        let Some(lines) = TextReporter::new(self.ctx).render_lines() else {
            return Ok(None);
        };
        let mut text = lines.join("\n");
        if self.config.color {
            text = colorize(&text);
        }
        text.push('\n');

        let mut out = stdout();
        out.write_all(text.as_bytes())
            .await
            .with_context(|| "Failed to write report to stdout")?;
        out.flush()
            .await
            .with_context(|| "Failed to flush stdout")?;
        Ok(Some(Dispatch::Sent(true)))
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}

pub struct StdoutFactory;

impl ReporterFactory for StdoutFactory {
    fn name(&self) -> &'static str {
        "stdout"
    }

    fn enabled(&self, config: &ReportConfig) -> bool {
        config.stdout.enabled
    }

    fn base_format(&self, _config: &ReportConfig) -> Format {
        Format::Text
    }

    fn build<'a>(
        &self,
        ctx: ReportContext<'a>,
        _services: &'a Services,
    ) -> Result<Box<dyn Reporter + 'a>> {
        Ok(Box::new(StdoutReporter::new(ctx)))
    }
}
