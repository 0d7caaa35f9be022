use super::{Content, Dispatch, ReportContext, Reporter, content_of, signature};
use crate::{
    config::MarkdownConfig,
    diff::{DiffStyle, Markup, fenced},
    job::{Job, JobState},
};
use anyhow::Result;
use async_trait::async_trait;

const TRIMMED_NOTICE: &str = "*Parts of the report were omitted due to message length.*";
const BODY_TRIMMED: &str = "*diff trimmed*";

fn char_len(s: &str) -> usize {
    s.chars().count()
}

// Length of `lines` joined by newlines.
fn joined_len(lines: &[String]) -> usize {
    match lines.len() {
        0 => 0,
        n => lines.iter().map(|l| char_len(l)).sum::<usize>() + n - 1,
    }
}

// Longest prefix of at most `max` chars, cut back to a line boundary when
// there is one.
fn truncate_at_line(text: &str, max: usize) -> &str {
    let Some((idx, _)) = text.char_indices().nth(max) else {
        return text;
    };
    match text[..idx].rfind('\n') {
        Some(pos) => &text[..pos],
        None => &text[..idx],
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '`' | '*' | '_' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn link_target(location: &str) -> String {
    location
        .replace(' ', "%20")
        .replace('(', "%28")
        .replace(')', "%29")
}

fn title(job: &dyn Job) -> String {
    let name = job.pretty_name();
    let location = job.location();
    if job.location_is_url() {
        format!("[{}]({})", escape(&name), link_target(&location))
    } else if name == location {
        escape(&location)
    } else {
        format!("{} ({})", escape(&name), escape(&location))
    }
}

// Keeps the earliest summary lines that fit in `max_length` together with
// the notice.
fn fit_summary(max_length: usize, summary: Vec<String>) -> Vec<String> {
    if joined_len(&summary) <= max_length {
        return summary;
    }
    let max = max_length.saturating_sub(char_len(TRIMMED_NOTICE) + 1);
    let mut used = 0;
    let mut kept = Vec::new();
    for line in summary {
        let len = char_len(&line) + 1;
        if used + len > max {
            break;
        }
        used += len;
        kept.push(line);
    }
    kept.push(TRIMMED_NOTICE.to_string());
    kept
}

/// Raw body text plus the info string of the fence it is shown in.
struct Body {
    text: String,
    info: &'static str,
}

impl Body {
    fn render(&self) -> String {
        fenced(&self.text, self.info)
    }

    /// Fits the fenced body into `budget` chars. Returns the rendering and
    /// whether it had to be cut; an empty string when not even a trimmed
    /// version fits.
    fn fit(&self, budget: usize) -> (String, bool) {
        let full = self.render();
        let full_len = char_len(&full);
        if full_len <= budget {
            return (full, false);
        }
        let text = self.text.strip_suffix('\n').unwrap_or(&self.text);
        let overhead = full_len - char_len(text) + 1 + char_len(BODY_TRIMMED);
        let cut = truncate_at_line(text, budget.saturating_sub(overhead));
        if cut.is_empty() {
            return (String::new(), true);
        }
        let trimmed = format!("{}\n{}", fenced(cut, self.info), BODY_TRIMMED);
        if char_len(&trimmed) <= budget {
            (trimmed, true)
        } else {
            (String::new(), true)
        }
    }
}

struct Detail {
    header: String,
    body: Option<Body>,
}

struct Layout {
    trimmed: bool,
    summary: Vec<String>,
    details: Vec<(String, String)>,
    footer: Vec<String>,
}

impl Layout {
    fn untrimmed(summary: Vec<String>, details: Vec<Detail>, footer: Vec<String>) -> Self {
        let details = details
            .into_iter()
            .map(|d| (d.header, d.body.map(|b| b.render()).unwrap_or_default()))
            .collect();
        Self {
            trimmed: false,
            summary,
            details,
            footer,
        }
    }

    /// Shares `max_length` between the parts. Summary and footer are kept
    /// whole or dropped; each job gets an equal share of what remains, and
    /// whatever a job leaves unused carries over to the jobs after it.
    fn fit(
        max_length: usize,
        summary: Vec<String>,
        details: Vec<Detail>,
        footer: Vec<String>,
    ) -> Self {
        // summary lines plus the blank line after them
        let summary_len = joined_len(&summary) + 2;
        let footer_len = joined_len(&footer);

        let untrimmed_len = summary_len
            + footer_len
            + details
                .iter()
                .map(|d| {
                    char_len(&d.header) + d.body.as_ref().map_or(0, |b| char_len(&b.render()) + 1) + 2
                })
                .sum::<usize>();
        if untrimmed_len <= max_length {
            return Self::untrimmed(summary, details, footer);
        }

        let max = max_length.saturating_sub(char_len(TRIMMED_NOTICE) + 1);
        let dropped = |summary: Vec<String>, footer: Vec<String>| Self {
            trimmed: true,
            summary,
            details: Vec::new(),
            footer,
        };
        if summary_len > max {
            return dropped(Vec::new(), Vec::new());
        }
        if footer_len > max - summary_len {
            return dropped(summary, Vec::new());
        }
        let mut remaining = max - summary_len - footer_len;
        let headers_len: usize = details.iter().map(|d| char_len(&d.header) + 2).sum();
        if headers_len > remaining {
            return dropped(summary, footer);
        }
        remaining -= headers_len;

        let mut trimmed = false;
        let mut fitted = Vec::with_capacity(details.len());
        let mut left = details.len();
        for detail in details {
            let share = remaining / left;
            let body = match detail.body {
                Some(body) => {
                    let (text, cut) = body.fit(share.saturating_sub(1));
                    trimmed |= cut;
                    text
                }
                None => String::new(),
            };
            if !body.is_empty() {
                remaining -= char_len(&body) + 1;
            }
            left -= 1;
            fitted.push((detail.header, body));
        }

        Self {
            trimmed,
            summary,
            details: fitted,
            footer,
        }
    }

    fn into_lines(self) -> Vec<String> {
        let mut lines = Vec::new();
        let has_summary = !self.summary.is_empty();
        if has_summary {
            lines.extend(self.summary);
            lines.push(String::new());
        }
        for (header, body) in self.details {
            lines.push(header);
            if !body.is_empty() {
                lines.push(body);
            }
            lines.push(String::new());
        }
        if self.trimmed {
            lines.push(TRIMMED_NOTICE.to_string());
        }
        if has_summary {
            lines.extend(self.footer);
        }
        lines
    }
}

/// Renders a report as Markdown, optionally trimmed to a length budget.
pub struct MarkdownReporter<'a> {
    ctx: ReportContext<'a>,
    config: &'a MarkdownConfig,
}

impl<'a> MarkdownReporter<'a> {
    pub fn new(ctx: ReportContext<'a>) -> Self {
        Self {
            config: &ctx.config().markdown,
            ctx,
        }
    }

    fn body(&self, state: &JobState) -> Option<Body> {
        let info = match self.config.diff {
            DiffStyle::Table => "",
            _ => "diff",
        };
        let body = match content_of(state)? {
            Content::Failure(detail) => Body {
                text: detail.to_string(),
                info: "",
            },
            Content::Snapshot(data) => Body {
                text: data.to_string(),
                info: "",
            },
            Content::Diff => Body {
                text: state.render_diff(self.config.diff, Markup::Plain),
                info,
            },
        };
        Some(body)
    }

    fn footer(&self) -> Vec<String> {
        if !self.config.footer {
            return Vec::new();
        }
        vec![
            "--- ".to_string(),
            format!("{}  ", signature()),
            self.ctx.watched_line(),
        ]
    }

    pub fn render(&self) -> Option<String> {
        let states = self.ctx.filtered();
        if states.is_empty() {
            return None;
        }

        let summary: Vec<String> = states
            .iter()
            .map(|s| format!("* {}: {}", s.verb().label(), title(s.job())))
            .collect();
        if self.config.minimal {
            let summary = match self.config.max_length {
                Some(max_length) => fit_summary(max_length, summary),
                None => summary,
            };
            return Some(summary.join("\n"));
        }

        let details = if self.config.details {
            states
                .iter()
                .map(|s| Detail {
                    header: format!("### {}: {}", s.verb().label(), title(s.job())),
                    body: self.body(s),
                })
                .collect()
        } else {
            Vec::new()
        };

        let layout = match self.config.max_length {
            Some(max_length) => Layout::fit(max_length, summary, details, self.footer()),
            None => Layout::untrimmed(summary, details, self.footer()),
        };
        Some(layout.into_lines().join("\n"))
    }
}

#[async_trait]
impl Reporter for MarkdownReporter<'_> {
    async fn submit(&self) -> Result<Option<Dispatch>> {
        Ok(self.render().map(Dispatch::Rendered))
    }

    fn name(&self) -> &'static str {
        "markdown"
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{changed, job, report};
    use super::*;
    use crate::{config::Config, job::StaticJob};
    use pretty_assertions::assert_eq;
    use std::{sync::Arc, time::Duration};

    fn render(config: Config, states: Vec<JobState>) -> Option<String> {
        let report = report(config, states);
        let ctx = ReportContext::new(&report, report.job_states(), Duration::from_secs(1));
        MarkdownReporter::new(ctx).render()
    }

    fn big_diff() -> (String, String) {
        let old: String = (0..100).map(|i| format!("line {}\n", i)).collect();
        let new: String = (0..100).map(|i| format!("LINE {}\n", i)).collect();
        (old, new)
    }

    #[test]
    fn test_full_layout() {
        let mut config = Config::default();
        config.report.markdown.footer = false;
        let text = render(config, vec![changed("Site", "a\n", "b\n")]).unwrap();
        assert_eq!(
            text,
            "\
* CHANGED: [Site](https://example.com/site)

### CHANGED: [Site](https://example.com/site)
```diff
--- old
+++ new
@@ -1 +1 @@
-a
+b
```
"
        );
    }

    #[test]
    fn test_footer() {
        let text = render(Config::default(), vec![changed("Site", "a\n", "b\n")]).unwrap();
        let expected_tail = format!("--- \n{}  \nwatched 1 jobs in 1s", signature());
        assert!(text.ends_with(&expected_tail), "{}", text);
        assert!(!text.contains(TRIMMED_NOTICE));
    }

    #[test]
    fn test_minimal() {
        let mut config = Config::default();
        config.report.markdown.minimal = true;
        let state = JobState::error(Arc::new(StaticJob::named("my_job", "ls -l")), "boom", None);
        let text = render(config, vec![changed("Site", "a\n", "b\n"), state]).unwrap();
        assert_eq!(
            text,
            "* CHANGED: [Site](https://example.com/site)\n* ERROR: my\\_job (ls -l)"
        );
    }

    #[test]
    fn test_minimal_respects_budget() {
        let states = || {
            (0..5)
                .map(|i| changed(&format!("J{}", i), "a\n", "b\n"))
                .collect::<Vec<_>>()
        };
        let mut config = Config::default();
        config.report.markdown.minimal = true;
        config.report.markdown.max_length = Some(150);
        let text = render(config.clone(), states()).unwrap();

        assert!(char_len(&text) <= 150, "{} chars", char_len(&text));
        assert_eq!(
            text,
            format!(
                "* CHANGED: [J0](https://example.com/j0)\n* CHANGED: [J1](https://example.com/j1)\n{}",
                TRIMMED_NOTICE
            )
        );

        config.report.markdown.max_length = Some(1000);
        let text = render(config, states()).unwrap();
        assert_eq!(text.lines().count(), 5);
        assert!(!text.contains(TRIMMED_NOTICE));
    }

    #[test]
    fn test_tiny_budget_leaves_only_notice() {
        let mut config = Config::default();
        config.report.markdown.max_length = Some(10);
        let text = render(config, vec![changed("Site", "a\n", "b\n")]).unwrap();
        assert_eq!(text, TRIMMED_NOTICE);
    }

    #[test]
    fn test_budget_prefers_earlier_jobs() {
        let (old, new) = big_diff();
        let states = || vec![changed("A", "a\n", "b\n"), changed("B", &old, &new)];

        let untrimmed = render(Config::default(), states()).unwrap();

        let mut config = Config::default();
        config.report.markdown.max_length = Some(600);
        let text = render(config, states()).unwrap();

        assert!(char_len(&text) <= 600, "{} chars", char_len(&text));
        assert!(char_len(&text) < char_len(&untrimmed));
        assert!(text.contains("```diff\n--- old\n+++ new\n@@ -1 +1 @@\n-a\n+b\n```"));
        assert!(text.contains("### CHANGED: [B](https://example.com/b)"));
        assert!(text.contains(BODY_TRIMMED));
        assert!(text.contains(TRIMMED_NOTICE));
        assert!(text.ends_with("watched 2 jobs in 1s"));
    }

    #[test]
    fn test_budget_large_enough_changes_nothing() {
        let states = || vec![changed("A", "a\n", "b\n")];
        let untrimmed = render(Config::default(), states()).unwrap();

        let mut config = Config::default();
        config.report.markdown.max_length = Some(100_000);
        assert_eq!(render(config, states()).unwrap(), untrimmed);
    }

    #[test]
    fn test_fence_survives_backticks_in_content() {
        let text = render(
            Config::default(),
            vec![JobState::unchanged(job("Code"), "```\nrm -rf /\n```")],
        );
        // unchanged states are hidden by default
        assert_eq!(text, None);

        let mut config = Config::default();
        config.display.unchanged = true;
        let text = render(
            config,
            vec![JobState::unchanged(job("Code"), "```\nrm -rf /\n```")],
        )
        .unwrap();
        assert!(text.contains("````\n```\nrm -rf /\n```\n````"));
    }

    #[test]
    fn test_truncate_at_line() {
        assert_eq!(truncate_at_line("abc\ndef\nghi", 6), "abc");
        assert_eq!(truncate_at_line("abcdef", 3), "abc");
        assert_eq!(truncate_at_line("ab", 5), "ab");
        assert_eq!(truncate_at_line("äöü\nx", 4), "äöü");
    }
}
