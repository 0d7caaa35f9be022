use super::{Content, Dispatch, ReportContext, Reporter, content_of, plain_title, signature};
use crate::{config::TextConfig, diff::Markup, job::JobState};
use anyhow::Result;
use async_trait::async_trait;

/// Renders a report as plain text.
///
/// Layout: a numbered summary between `=` rules, then one block per job
/// with its body between `-` rules, then a `-- ` signature footer.
pub struct TextReporter<'a> {
    ctx: ReportContext<'a>,
    config: &'a TextConfig,
}

impl<'a> TextReporter<'a> {
    pub fn new(ctx: ReportContext<'a>) -> Self {
        Self {
            config: &ctx.config().text,
            ctx,
        }
    }

    fn rule(&self, c: char) -> Option<String> {
        (self.config.line_length > 0).then(|| c.to_string().repeat(self.config.line_length))
    }

    fn body(&self, state: &JobState) -> Option<String> {
        let body = match content_of(state)? {
            Content::Failure(detail) => detail.to_string(),
            Content::Snapshot(data) => data.to_string(),
            Content::Diff => state.render_diff(self.config.diff, Markup::Plain),
        };
        Some(body.trim_end_matches('\n').to_string())
    }

    fn details(&self, state: &JobState) -> Vec<String> {
        let rule = self.rule('-');
        let mut lines = Vec::new();
        lines.extend(rule.clone());
        lines.push(format!("{}: {}", state.verb().label(), plain_title(state.job())));
        lines.extend(rule.clone());
        if let Some(body) = self.body(state) {
            lines.push(body);
            lines.extend(rule.clone());
        }
        lines.push(String::new());
        if rule.is_some() {
            lines.push(String::new());
        }
        lines
    }

    /// Report lines, or `None` when nothing survives the display policy.
    pub fn render_lines(&self) -> Option<Vec<String>> {
        let states = self.ctx.filtered();
        if states.is_empty() {
            return None;
        }

        if self.config.minimal {
            return Some(
                states
                    .iter()
                    .map(|s| format!("{}: {}", s.verb().label(), plain_title(s.job())))
                    .collect(),
            );
        }

        let mut lines = Vec::new();
        let rule = self.rule('=');
        lines.extend(rule.clone());
        for (i, state) in states.iter().enumerate() {
            lines.push(format!(
                "{:02}. {}: {}",
                i + 1,
                state.verb().label(),
                state.job().pretty_name()
            ));
        }
        lines.extend(rule);
        lines.push(String::new());

        if self.config.details {
            for state in &states {
                lines.extend(self.details(state));
            }
        }

        if self.config.footer {
            lines.push("-- ".to_string());
            lines.push(signature());
            lines.push(self.ctx.watched_line());
        }
        Some(lines)
    }
}

#[async_trait]
impl Reporter for TextReporter<'_> {
    async fn submit(&self) -> Result<Option<Dispatch>> {
        Ok(self
            .render_lines()
            .map(|lines| Dispatch::Rendered(lines.join("\n"))))
    }

    fn name(&self) -> &'static str {
        "text"
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{changed, job, report};
    use super::*;
    use crate::{config::Config, job::JobState};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn render(config: Config, states: Vec<JobState>) -> Option<String> {
        let report = report(config, states);
        let ctx = ReportContext::new(&report, report.job_states(), Duration::from_secs(1));
        TextReporter::new(ctx)
            .render_lines()
            .map(|lines| lines.join("\n"))
    }

    fn config(line_length: usize) -> Config {
        let mut config = Config::default();
        config.report.text.line_length = line_length;
        config
    }

    #[test]
    fn test_full_layout() {
        let text = render(config(10), vec![changed("Site", "a\n", "b\n")]).unwrap();
        let signature = signature();
        let expected = vec![
            "==========",
            "01. CHANGED: Site",
            "==========",
            "",
            "----------",
            "CHANGED: Site ( https://example.com/site )",
            "----------",
            "--- old\n+++ new\n@@ -1 +1 @@\n-a\n+b",
            "----------",
            "",
            "",
            "-- ",
            signature.as_str(),
            "watched 1 jobs in 1s",
        ]
        .join("\n");
        assert_eq!(text, expected);
    }

    #[test]
    fn test_zero_line_length_drops_rules() {
        let mut config = config(0);
        config.report.text.footer = false;
        let text = render(config, vec![changed("Site", "a\n", "b\n")]).unwrap();
        assert_eq!(
            text,
            "01. CHANGED: Site\n\nCHANGED: Site ( https://example.com/site )\n--- old\n+++ new\n@@ -1 +1 @@\n-a\n+b\n"
        );
    }

    #[test]
    fn test_minimal_wins_over_details() {
        let mut config = config(10);
        config.report.text.minimal = true;
        config.report.text.details = true;
        let text = render(
            config,
            vec![
                changed("Site", "a\n", "b\n"),
                JobState::error(job("Down"), "timed out", None),
            ],
        )
        .unwrap();
        assert_eq!(
            text,
            "CHANGED: Site ( https://example.com/site )\nERROR: Down ( https://example.com/down )"
        );
    }

    #[test]
    fn test_without_details_only_summary() {
        let mut config = config(10);
        config.report.text.details = false;
        config.report.text.footer = false;
        let text = render(config, vec![changed("Site", "a\n", "b\n")]).unwrap();
        assert_eq!(text, "==========\n01. CHANGED: Site\n==========\n");
    }

    #[test]
    fn test_error_shows_traceback() {
        let text = render(
            config(0),
            vec![JobState::error(
                job("Down"),
                "timed out",
                Some("Traceback:\n  connect()\n".to_string()),
            )],
        )
        .unwrap();
        assert!(text.contains("ERROR: Down ( https://example.com/down )\nTraceback:\n  connect()\n"));
        assert!(!text.contains("timed out"));
    }

    #[test]
    fn test_location_only_job_title() {
        use crate::job::StaticJob;
        use std::sync::Arc;
        let state = JobState::changed(Arc::new(StaticJob::new("echo hi")), "a", "b");
        let text = render(config(0), vec![state]).unwrap();
        assert!(text.contains("\nCHANGED: echo hi\n"));
    }

    #[test]
    fn test_nothing_to_report() {
        let states = vec![JobState::unchanged(job("Quiet"), "same")];
        assert_eq!(render(Config::default(), states), None);
    }
}
