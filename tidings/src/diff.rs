/// Diff rendering for the tidings reporting core
///
/// Turns two opaque text snapshots into a displayable diff. The diffing
/// itself is delegated to `similar`; this module only lays the result out
/// in one of the supported styles and wraps it for the target markup.
/// Output never embeds timestamps, so identical input renders identically.
use crate::job::DEFAULT_CONTEXT_LINES;
use serde::Deserialize;
use similar::{DiffOp, DiffTag, TextDiff};
use std::fmt::Write;

const OLD_HEADER: &str = "old";
const NEW_HEADER: &str = "new";

/// Visual layout of a diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffStyle {
    #[default]
    Unified,
    Context,
    /// Old and new next to each other.
    #[serde(alias = "side-by-side")]
    Table,
}

/// Surrounding document format the diff is embedded in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Markup {
    #[default]
    Plain,
    Markdown,
    Html,
}

#[derive(Debug, Clone, Copy)]
pub struct DiffRenderer {
    style: DiffStyle,
    markup: Markup,
    context_lines: usize,
}

impl DiffRenderer {
    pub fn new(style: DiffStyle, markup: Markup) -> Self {
        Self {
            style,
            markup,
            context_lines: DEFAULT_CONTEXT_LINES,
        }
    }

    pub fn context_lines(mut self, context_lines: usize) -> Self {
        self.context_lines = context_lines;
        self
    }

    /// Renders the diff between `old` and `new`. Returns an empty string
    /// when there is nothing to show, whatever the markup.
    pub fn render(&self, old: &str, new: &str) -> String {
        let diff = TextDiff::from_lines(old, new);
        let groups = diff.grouped_ops(self.context_lines);
        if groups.is_empty() {
            return String::new();
        }

        match (self.markup, self.style) {
            (Markup::Html, DiffStyle::Table) => html_table(&diff, &groups),
            (markup, style) => {
                let text = match style {
                    DiffStyle::Unified => diff
                        .unified_diff()
                        .context_radius(self.context_lines)
                        .header(OLD_HEADER, NEW_HEADER)
                        .to_string(),
                    DiffStyle::Context => context_diff(&diff, &groups),
                    DiffStyle::Table => side_by_side(&diff, &groups),
                };
                match markup {
                    Markup::Plain => text,
                    Markup::Markdown => {
                        let info = if style == DiffStyle::Table { "" } else { "diff" };
                        fenced(&text, info)
                    }
                    Markup::Html => html_pre(&text, style),
                }
            }
        }
    }
}

fn line(slice: &str) -> &str {
    slice.strip_suffix('\n').unwrap_or(slice)
}

// difflib-style range: "start,end" 1-based, or a single number
fn context_range(start: usize, end: usize) -> String {
    let len = end - start;
    let first = if len == 0 { start } else { start + 1 };
    if len <= 1 {
        format!("{}", first)
    } else {
        format!("{},{}", first, first + len - 1)
    }
}

fn context_diff(diff: &TextDiff<'_, '_, '_, str>, groups: &[Vec<DiffOp>]) -> String {
    let old = diff.old_slices();
    let new = diff.new_slices();
    let mut out = format!("*** {}\n--- {}\n", OLD_HEADER, NEW_HEADER);

    for group in groups {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let old_span = first.old_range().start..last.old_range().end;
        let new_span = first.new_range().start..last.new_range().end;

        out.push_str("***************\n");
        let _ = writeln!(out, "*** {} ****", context_range(old_span.start, old_span.end));
        if group
            .iter()
            .any(|op| matches!(op.tag(), DiffTag::Delete | DiffTag::Replace))
        {
            for op in group {
                let prefix = match op.tag() {
                    DiffTag::Equal => "  ",
                    DiffTag::Delete => "- ",
                    DiffTag::Replace => "! ",
                    DiffTag::Insert => continue,
                };
                for slice in &old[op.old_range()] {
                    let _ = writeln!(out, "{}{}", prefix, line(slice));
                }
            }
        }

        let _ = writeln!(out, "--- {} ----", context_range(new_span.start, new_span.end));
        if group
            .iter()
            .any(|op| matches!(op.tag(), DiffTag::Insert | DiffTag::Replace))
        {
            for op in group {
                let prefix = match op.tag() {
                    DiffTag::Equal => "  ",
                    DiffTag::Insert => "+ ",
                    DiffTag::Replace => "! ",
                    DiffTag::Delete => continue,
                };
                for slice in &new[op.new_range()] {
                    let _ = writeln!(out, "{}{}", prefix, line(slice));
                }
            }
        }
    }
    out
}

/// One row of a side-by-side diff.
struct Row<'a> {
    old: Option<(usize, &'a str)>,
    new: Option<(usize, &'a str)>,
    tag: DiffTag,
}

fn rows<'a>(diff: &'a TextDiff<'_, '_, '_, str>, group: &[DiffOp]) -> Vec<Row<'a>> {
    let old = diff.old_slices();
    let new = diff.new_slices();
    let mut rows = Vec::new();
    for op in group {
        let old_range = op.old_range();
        let new_range = op.new_range();
        let height = old_range.len().max(new_range.len());
        for i in 0..height {
            let old_idx = old_range.start + i;
            let new_idx = new_range.start + i;
            rows.push(Row {
                old: (i < old_range.len()).then(|| (old_idx + 1, line(old[old_idx]))),
                new: (i < new_range.len()).then(|| (new_idx + 1, line(new[new_idx]))),
                tag: op.tag(),
            });
        }
    }
    rows
}

fn side_by_side(diff: &TextDiff<'_, '_, '_, str>, groups: &[Vec<DiffOp>]) -> String {
    let grouped: Vec<Vec<Row<'_>>> = groups.iter().map(|group| rows(diff, group)).collect();
    let width = grouped
        .iter()
        .flatten()
        .filter_map(|row| row.old.map(|(_, text)| text.chars().count()))
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for (i, group) in grouped.iter().enumerate() {
        if i > 0 {
            out.push_str("...\n");
        }
        for row in group {
            let marker = match (row.tag, row.old.is_some(), row.new.is_some()) {
                (DiffTag::Equal, _, _) => ' ',
                (_, true, true) => '|',
                (_, true, false) => '<',
                (_, false, _) => '>',
            };
            let left = row.old.map(|(_, text)| text).unwrap_or_default();
            let right = row.new.map(|(_, text)| text).unwrap_or_default();
            let rendered = format!("{:<width$} {} {}", left, marker, right, width = width);
            out.push_str(rendered.trim_end());
            out.push('\n');
        }
    }
    out
}

/// Wraps `body` in a code fence longer than any backtick run it contains,
/// so the content cannot close the block early.
pub fn fenced(body: &str, info: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in body.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    let fence = "`".repeat((longest + 1).max(3));
    let body = body.strip_suffix('\n').unwrap_or(body);
    format!("{fence}{info}\n{body}\n{fence}")
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn html_line_class(line: &str, style: DiffStyle) -> &'static str {
    match style {
        DiffStyle::Context => match line.get(..2) {
            Some("+ ") => "unified_add",
            Some("- ") => "unified_sub",
            Some("! ") => "unified_chg",
            _ => "unified_nor",
        },
        _ => match line.chars().next() {
            Some('+') => "unified_add",
            Some('-') => "unified_sub",
            _ => "unified_nor",
        },
    }
}

fn html_pre(text: &str, style: DiffStyle) -> String {
    let lines: Vec<String> = text
        .lines()
        .map(|line| {
            format!(
                "<span class=\"{}\">{}</span>",
                html_line_class(line, style),
                escape_html(line)
            )
        })
        .collect();
    format!(
        "<pre style=\"text-decoration: none;\">{}</pre>",
        lines.join("\n")
    )
}

fn html_table(diff: &TextDiff<'_, '_, '_, str>, groups: &[Vec<DiffOp>]) -> String {
    let mut out = String::from("<table class=\"diff\">\n");
    for (i, group) in groups.iter().enumerate() {
        if i > 0 {
            out.push_str("<tbody><tr><td colspan=\"4\" class=\"diff_next\">...</td></tr></tbody>\n");
        }
        out.push_str("<tbody>\n");
        for row in rows(diff, group) {
            let class = match (row.tag, row.old.is_some(), row.new.is_some()) {
                (DiffTag::Equal, _, _) => "",
                (_, true, true) => "diff_chg",
                (_, true, false) => "diff_sub",
                (_, false, _) => "diff_add",
            };
            let cell = |side: Option<(usize, &str)>| match side {
                Some((no, text)) => format!(
                    "<td class=\"diff_header\">{}</td><td class=\"{}\">{}</td>",
                    no,
                    class,
                    escape_html(text)
                ),
                None => "<td class=\"diff_header\"></td><td></td>".to_string(),
            };
            let _ = writeln!(out, "<tr>{}{}</tr>", cell(row.old), cell(row.new));
        }
        out.push_str("</tbody>\n");
    }
    out.push_str("</table>");
    out
}
