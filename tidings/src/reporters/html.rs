use super::{Content, Dispatch, ReportContext, Reporter, content_of, signature};
use crate::{
    config::HtmlConfig,
    diff::{Markup, escape_html},
    job::{Job, JobState},
};
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Write;

const STYLE: &str = "\
body { font-family: sans-serif; }
.unified_add { color: green; }
.unified_sub { color: red; }
.unified_chg { color: #b8860b; }
.unified_nor { color: #444; }
table.diff { font-family: monospace; border-collapse: collapse; }
.diff_header { color: #888; text-align: right; padding-right: 0.5em; }
.diff_add { background-color: #aaffaa; }
.diff_sub { background-color: #ffaaaa; }
.diff_chg { background-color: #ffff77; }
.diff_next { color: #888; }";

fn title(job: &dyn Job) -> String {
    let name = escape_html(&job.pretty_name());
    if job.location_is_url() {
        format!("<a href=\"{}\">{}</a>", escape_html(&job.location()), name)
    } else {
        name
    }
}

/// Renders a report as a standalone HTML document.
pub struct HtmlReporter<'a> {
    ctx: ReportContext<'a>,
    config: &'a HtmlConfig,
}

impl<'a> HtmlReporter<'a> {
    pub fn new(ctx: ReportContext<'a>) -> Self {
        Self {
            config: &ctx.config().html,
            ctx,
        }
    }

    fn body(&self, state: &JobState) -> Option<String> {
        let body = match content_of(state)? {
            Content::Failure(detail) => format!(
                "<pre style=\"text-decoration: none; color: red;\">{}</pre>",
                escape_html(detail)
            ),
            Content::Snapshot(data) => format!(
                "<pre style=\"text-decoration: none;\">{}</pre>",
                escape_html(data)
            ),
            Content::Diff => state.render_diff(self.config.diff, Markup::Html),
        };
        Some(body)
    }

    pub fn render(&self) -> Option<String> {
        let states = self.ctx.filtered();
        if states.is_empty() {
            return None;
        }

        let mut out = String::new();
        let _ = write!(
            out,
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>\n{}\n</style>\n</head>\n<body>\n",
            escape_html(&signature()),
            STYLE
        );
        for state in &states {
            let _ = writeln!(
                out,
                "<h2><span class=\"verb\">{}</span>: {}</h2>",
                state.verb().label(),
                title(state.job())
            );
            if !state.job().location_is_url() && state.job().pretty_name() != state.job().location() {
                let _ = writeln!(out, "<div>{}</div>", escape_html(&state.job().location()));
            }
            if let Some(body) = self.body(state) {
                out.push_str(body.trim_end());
                out.push('\n');
            }
            out.push_str("<hr>\n");
        }
        let _ = write!(
            out,
            "<address>{}, {}</address>\n</body>\n</html>\n",
            escape_html(&signature()),
            escape_html(&self.ctx.watched_line())
        );
        Some(out)
    }
}

#[async_trait]
impl Reporter for HtmlReporter<'_> {
    async fn submit(&self) -> Result<Option<Dispatch>> {
        Ok(self.render().map(Dispatch::Rendered))
    }

    fn name(&self) -> &'static str {
        "html"
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{changed, job, report};
    use super::*;
    use crate::{config::Config, diff::DiffStyle, job::StaticJob};
    use std::{sync::Arc, time::Duration};

    fn render(config: Config, states: Vec<JobState>) -> Option<String> {
        let report = report(config, states);
        let ctx = ReportContext::new(&report, report.job_states(), Duration::from_secs(1));
        HtmlReporter::new(ctx).render()
    }

    #[test]
    fn test_document_structure() {
        let html = render(Config::default(), vec![changed("Site", "a\n", "b\n")]).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>\n<html>\n<head>"));
        assert!(html.ends_with("</body>\n</html>\n"));
        assert!(html.contains(
            "<h2><span class=\"verb\">CHANGED</span>: <a href=\"https://example.com/site\">Site</a></h2>"
        ));
        assert!(html.contains("<span class=\"unified_add\">+b</span>"));
        assert!(html.contains("<span class=\"unified_sub\">-a</span>"));
        assert!(html.contains("watched 1 jobs in 1s</address>"));
    }

    #[test]
    fn test_table_diff() {
        let mut config = Config::default();
        config.report.html.diff = DiffStyle::Table;
        let html = render(config, vec![changed("Site", "a\n", "b\n")]).unwrap();
        assert!(html.contains("<table class=\"diff\">"));
        assert!(html.contains("diff_chg"));
    }

    #[test]
    fn test_names_and_errors_are_escaped() {
        let state = JobState::error(
            Arc::new(StaticJob::named("<script>", "cat /etc/motd")),
            "boom",
            Some("x < y".to_string()),
        );
        let html = render(Config::default(), vec![state]).unwrap();
        assert!(html.contains("ERROR</span>: &lt;script&gt;</h2>"));
        assert!(html.contains("<div>cat /etc/motd</div>"));
        assert!(html.contains("color: red;\">x &lt; y</pre>"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_nothing_to_report() {
        let states = vec![JobState::unchanged(job("Quiet"), "same")];
        assert_eq!(render(Config::default(), states), None);
    }
}
