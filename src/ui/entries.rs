use crate::app::{App, Focus};
use crate::model::Status;
use crate::theme::status_role;
use crate::tree::ROOT_LABEL;
use crate::util::{display_width, format_relative_time, strip_control_chars, truncate_to_width};
use chrono::Utc;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

/// Width reserved on the right for the timestamp column.
const TIME_COLUMN: usize = 8;

/// Render the entry list with its filter bar.
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 3 || area.height < 4 {
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);

    render_list(f, app, chunks[0]);
    render_filter_bar(f, app, chunks[1]);
}

fn render_list(f: &mut Frame, app: &App, area: Rect) {
    let is_focused = app.focus == Focus::Entries;
    let entries = app.visible_entries();
    let now = Utc::now();

    // Borders plus the icon column.
    let label_width = (area.width as usize).saturating_sub(2 + 2 + TIME_COLUMN);

    let items: Vec<ListItem> = if entries.is_empty() {
        let msg = if app.loading {
            "Loading..."
        } else if app.cache.entries.is_empty() {
            "No entries yet. Press a to add one."
        } else {
            "Nothing matches the current filter"
        };
        vec![ListItem::new(Span::styled(msg, app.style("detail_metadata")))]
    } else {
        entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let status = entry.status_kind();
                let label_style = if is_focused && i == app.selected_entry {
                    app.style("entry_selected")
                } else if status == Some(Status::Done) {
                    app.style("entry_done")
                } else {
                    app.style("entry_label")
                };

                let clean = strip_control_chars(&entry.label);
                let label = truncate_to_width(&clean, label_width);
                let pad = label_width.saturating_sub(display_width(&label));
                let time = format_relative_time(entry.last_touched(), now);

                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{} ", status.map(|s| s.icon()).unwrap_or("?")),
                        app.style(status_role(status)),
                    ),
                    Span::styled(label.into_owned(), label_style),
                    Span::raw(" ".repeat(pad)),
                    Span::styled(format!("{:>width$}", time, width = TIME_COLUMN), app.style("entry_date")),
                ]))
            })
            .collect()
    };

    let border_style = if is_focused {
        app.style("panel_border_focused")
    } else {
        app.style("panel_border")
    };

    let scope = match app.selection.selected().category_id() {
        Some(id) => app
            .cache
            .category(id)
            .map(|c| c.display_label().to_string())
            .unwrap_or_default(),
        None => ROOT_LABEL.to_string(),
    };
    let title = format!("Entries - {} ({})", scope, entries.len());

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(title),
        )
        .highlight_style(Style::default());

    let selected = (!entries.is_empty()).then_some(app.selected_entry);
    let mut state = ListState::default().with_selected(selected);
    f.render_stateful_widget(list, area, &mut state);
}

/// One-line summary of the status mask and the label filter.
fn render_filter_bar(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = Vec::with_capacity(Status::ALL.len() * 2 + 2);
    for status in Status::ALL {
        let hidden = app.filter.is_hidden(status);
        let style = if hidden {
            app.style("detail_metadata")
        } else {
            app.style(status_role(Some(status)))
        };
        let mark = if hidden { " " } else { status.icon() };
        spans.push(Span::styled(format!("[{}]{} ", mark, status.name()), style));
    }

    if app.filter_editing {
        spans.push(Span::styled(
            format!(" /{}_", app.filter.text),
            app.style("filter_bar"),
        ));
    } else if !app.filter.text.is_empty() {
        spans.push(Span::styled(
            format!(" /{}", app.filter.text),
            app.style("filter_bar"),
        ));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
