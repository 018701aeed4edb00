use crate::app::App;
use crate::theme::{status_role, StyleMap};
use crate::tree::label_path;
use crate::util::{format_relative_time, strip_control_chars};
use chrono::Utc;
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use ratatui::{
    layout::Rect,
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

/// Render the entry detail page.
pub fn render(f: &mut Frame, app: &mut App, area: Rect) {
    if area.width < 3 || area.height < 3 {
        return;
    }
    app.detail_visible_lines = area.height.saturating_sub(2) as usize;

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(app.style("panel_border_focused"))
        .title("Entry");

    let Some(entry) = app.detail_entry() else {
        let paragraph = Paragraph::new(Span::styled("Entry not found", app.style("detail_missing")))
            .block(block);
        f.render_widget(paragraph, area);
        return;
    };

    let status = entry.status_kind();
    let category = entry
        .category
        .as_deref()
        .and_then(|id| label_path(&app.cache.categories, id))
        .unwrap_or_else(|| "No category".to_string());
    let now = Utc::now();
    let mut meta = format!(
        "{} · {} · created {}",
        status.map(|s| s.name()).unwrap_or("unknown"),
        category,
        format_relative_time(entry.created_at, now)
    );
    if let Some(modified) = entry.modified_at {
        meta.push_str(&format!(" · edited {}", format_relative_time(modified, now)));
    }

    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                format!("{} ", status.map(|s| s.icon()).unwrap_or("?")),
                app.style(status_role(status)),
            ),
            Span::styled(strip_control_chars(&entry.label).into_owned(), app.style("detail_heading")),
        ]),
        Line::from(Span::styled(meta, app.style("detail_metadata"))),
        Line::from(""),
    ];
    match entry.text.as_deref().filter(|t| !t.trim().is_empty()) {
        Some(text) => lines.extend(render_markdown(&strip_control_chars(text), &app.theme)),
        None => lines.push(Line::from(Span::styled(
            "No text yet. Press e to write some.",
            app.style("detail_metadata"),
        ))),
    }

    // Wrapped height is approximated by the logical line count plus the
    // extra rows long lines need at this width.
    let width = area.width.saturating_sub(2).max(1) as usize;
    let content_lines: usize = lines
        .iter()
        .map(|l| l.width().max(1).div_ceil(width))
        .sum();
    let visible = app.detail_visible_lines;
    app.clamp_scroll(content_lines, visible);

    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .style(app.style("detail_body"))
        .wrap(Wrap { trim: false })
        .scroll((app.scroll_offset as u16, 0));
    f.render_widget(paragraph, area);
}

/// Convert markdown to styled lines using the theme's detail roles.
pub fn render_markdown(md: &str, theme: &StyleMap) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::with_capacity(md.lines().count());
    let mut current: Vec<Span<'static>> = Vec::with_capacity(4);
    let mut in_code_block = false;
    let mut in_heading = false;
    let mut emphasis = 0usize;
    let mut strong = 0usize;
    let mut list_depth = 0usize;
    let mut link_target: Option<String> = None;

    fn flush(lines: &mut Vec<Line<'static>>, current: &mut Vec<Span<'static>>) {
        if !current.is_empty() {
            lines.push(Line::from(std::mem::take(current)));
        }
    }

    for event in Parser::new(md) {
        match event {
            Event::Start(Tag::Heading { .. }) => in_heading = true,
            Event::End(TagEnd::Heading(_)) => {
                flush(&mut lines, &mut current);
                lines.push(Line::from(""));
                in_heading = false;
            }
            Event::End(TagEnd::Paragraph) => {
                flush(&mut lines, &mut current);
                if list_depth == 0 {
                    lines.push(Line::from(""));
                }
            }
            Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                lines.push(Line::from(""));
            }
            Event::Start(Tag::List(_)) => {
                flush(&mut lines, &mut current);
                list_depth += 1;
            }
            Event::End(TagEnd::List(_)) => {
                list_depth = list_depth.saturating_sub(1);
                if list_depth == 0 {
                    lines.push(Line::from(""));
                }
            }
            Event::Start(Tag::Item) => {
                flush(&mut lines, &mut current);
                current.push(Span::raw(format!(
                    "{}• ",
                    "  ".repeat(list_depth.saturating_sub(1))
                )));
            }
            Event::End(TagEnd::Item) => flush(&mut lines, &mut current),
            Event::Start(Tag::Emphasis) => emphasis += 1,
            Event::End(TagEnd::Emphasis) => emphasis = emphasis.saturating_sub(1),
            Event::Start(Tag::Strong) => strong += 1,
            Event::End(TagEnd::Strong) => strong = strong.saturating_sub(1),
            Event::Start(Tag::Link { dest_url, .. }) => link_target = Some(dest_url.into_string()),
            Event::End(TagEnd::Link) => {
                if let Some(url) = link_target.take() {
                    current.push(Span::styled(
                        format!(" <{}>", url),
                        theme.resolve("detail_metadata"),
                    ));
                }
            }
            Event::Text(text) if in_code_block => {
                // Code blocks arrive as one text event with embedded newlines.
                for line in text.lines() {
                    lines.push(Line::from(Span::styled(
                        line.to_string(),
                        theme.resolve("detail_code_block"),
                    )));
                }
            }
            Event::Text(text) => {
                let style = if in_heading {
                    theme.resolve("detail_heading")
                } else if link_target.is_some() {
                    theme.resolve("detail_link")
                } else if strong > 0 {
                    theme.resolve("detail_strong")
                } else if emphasis > 0 {
                    theme.resolve("detail_emphasis")
                } else {
                    theme.resolve("detail_body")
                };
                current.push(Span::styled(text.into_string(), style));
            }
            Event::Code(code) => current.push(Span::styled(
                code.into_string(),
                theme.resolve("detail_inline_code"),
            )),
            Event::TaskListMarker(done) => {
                current.push(Span::raw(if done { "[x] " } else { "[ ] " }));
            }
            Event::SoftBreak => current.push(Span::raw(" ")),
            Event::HardBreak => flush(&mut lines, &mut current),
            Event::Rule => {
                flush(&mut lines, &mut current);
                lines.push(Line::from(Span::styled(
                    "─".repeat(20),
                    theme.resolve("detail_metadata"),
                )));
            }
            _ => {}
        }
    }
    flush(&mut lines, &mut current);

    while lines.last().is_some_and(|l| l.width() == 0) {
        lines.pop();
    }
    lines
}
