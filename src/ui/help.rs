//! Help overlay: the live keybinding table, user overrides included.
//!
//! Bindings for the pane that has focus come first after the global ones,
//! and the footer shows which statuses the entry list currently hides.

use crate::app::{App, Focus, View};
use crate::filter::EntryFilter;
use crate::keybindings::Context;
use crate::model::Status;
use crate::theme::status_role;
use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Clear, Paragraph, Row, Table},
    Frame,
};

use super::render::{centered, overlay_block};

/// Context whose bindings currently apply on top of the global ones.
fn active_context(app: &App) -> Context {
    match (app.view, app.focus) {
        (View::Detail, _) => Context::Detail,
        (_, Focus::Categories) => Context::Categories,
        (_, Focus::Entries) => Context::Entries,
    }
}

/// Global bindings first, then the active pane, then the rest.
fn context_order(active: Context) -> Vec<Context> {
    let mut order = vec![Context::Global, active];
    order.extend(
        [Context::Categories, Context::Entries, Context::Detail]
            .into_iter()
            .filter(|c| *c != active),
    );
    order
}

/// Footer spans: every status, struck through when hidden, plus the label filter.
fn filter_summary<'a>(app: &App, filter: &'a EntryFilter) -> Line<'a> {
    let mut spans = vec![Span::raw(" Showing: ")];
    for status in Status::ALL {
        let mut style = app.style(status_role(Some(status)));
        if filter.is_hidden(status) {
            style = style.add_modifier(Modifier::CROSSED_OUT | Modifier::DIM);
        }
        spans.push(Span::styled(status.name(), style));
        spans.push(Span::raw(" "));
    }
    if !filter.text.is_empty() {
        spans.push(Span::styled(
            format!("/{} ", filter.text),
            app.style("detail_metadata"),
        ));
    }
    Line::from(spans)
}

/// Render the help overlay on top of the current view.
pub fn render(f: &mut Frame, app: &App) {
    let area = f.area();
    let overlay = centered(
        area,
        area.width.saturating_mul(4) / 5,
        area.height.saturating_mul(4) / 5,
    );
    if overlay.width < 20 || overlay.height < 6 {
        return;
    }
    f.render_widget(Clear, overlay);

    let active = active_context(app);
    let bindings = app.keybindings.all_bindings();

    let mut rows: Vec<Row> = Vec::new();
    for ctx in context_order(active) {
        let ctx_bindings: Vec<_> = bindings.iter().filter(|(c, _, _)| *c == ctx).collect();
        if ctx_bindings.is_empty() {
            continue;
        }

        let heading = if ctx == active {
            format!("-- {} (here) --", ctx.title())
        } else {
            format!("-- {} --", ctx.title())
        };
        rows.push(
            Row::new(vec![
                Line::from(Span::styled(
                    heading,
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
            ])
            .style(app.style("detail_heading")),
        );
        for (_, key_str, description) in ctx_bindings {
            rows.push(Row::new(vec![format!("  {}", key_str), description.to_string()]));
        }
        rows.push(Row::new(vec![String::new(), String::new()]));
    }
    rows.pop();

    // Borders, header and its margin.
    let visible_height = overlay.height.saturating_sub(4) as usize;
    let max_scroll = rows.len().saturating_sub(visible_height);
    let scroll = app.help_scroll_offset.min(max_scroll);
    let visible_rows: Vec<Row> = rows.into_iter().skip(scroll).take(visible_height).collect();

    let title = if max_scroll > 0 {
        format!(" Help {}/{} (j/k, ? to close) ", scroll + 1, max_scroll + 1)
    } else {
        " Help (? to close) ".to_string()
    };

    let table = Table::new(visible_rows, [Constraint::Length(16), Constraint::Min(20)])
        .block(overlay_block(app, title))
        .header(
            Row::new(vec!["Key", "Action"])
                .style(
                    Style::default()
                        .add_modifier(Modifier::BOLD)
                        .add_modifier(Modifier::UNDERLINED),
                )
                .bottom_margin(1),
        )
        .style(app.style("detail_body"));
    f.render_widget(table, overlay);

    let footer_area = Rect {
        x: overlay.x + 1,
        y: overlay.y + overlay.height.saturating_sub(1),
        width: overlay.width.saturating_sub(2),
        height: 1,
    };
    f.render_widget(Paragraph::new(filter_summary(app, &app.filter)), footer_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_focused_pane_listed_after_global() {
        assert_eq!(
            context_order(Context::Entries),
            vec![
                Context::Global,
                Context::Entries,
                Context::Categories,
                Context::Detail
            ]
        );
        assert_eq!(context_order(Context::Detail)[1], Context::Detail);
    }

    #[test]
    fn test_active_context_follows_view_and_focus() {
        let mut app = test_app();
        app.view = View::Browse;
        app.focus = Focus::Categories;
        assert_eq!(active_context(&app), Context::Categories);
        app.focus = Focus::Entries;
        assert_eq!(active_context(&app), Context::Entries);
        app.view = View::Detail;
        assert_eq!(active_context(&app), Context::Detail);
    }

    #[test]
    fn test_footer_marks_hidden_statuses() {
        let app = test_app();
        let mut filter = EntryFilter::default();
        filter.hide(Status::Done);
        filter.text = "plumb".to_string();

        let line = filter_summary(&app, &filter);
        let done = line.spans.iter().find(|s| s.content == "done").unwrap();
        assert!(done.style.add_modifier.contains(Modifier::CROSSED_OUT));
        let new = line.spans.iter().find(|s| s.content == "new").unwrap();
        assert!(!new.style.add_modifier.contains(Modifier::CROSSED_OUT));
        assert!(line.spans.iter().any(|s| s.content == "/plumb "));
    }
}
