//! Render dispatch: picks the view, then draws overlays on top.

use crate::app::{App, CategoryPicker, ConfirmAction, MoveTarget, Prompt, View};
use crate::util::strip_control_chars;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use super::{categories, detail, entries, help, login, status};

/// Minimum terminal dimensions required for normal operation.
pub(super) const MIN_WIDTH: u16 = 60;
pub(super) const MIN_HEIGHT: u16 = 10;

pub(super) fn render(f: &mut Frame, app: &mut App) {
    let area = f.area();
    if area.width < 1 || area.height < 1 {
        return;
    }

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = if area.height < 3 || area.width < 20 {
            Paragraph::new("Too small")
        } else {
            Paragraph::new(format!(
                "Terminal too small\n\nMinimum: {}x{}\nCurrent: {}x{}",
                MIN_WIDTH, MIN_HEIGHT, area.width, area.height
            ))
            .alignment(Alignment::Center)
        };
        f.render_widget(msg, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);

    match app.view {
        View::Login => login::render(f, app, chunks[0]),
        View::Browse => render_browse(f, app, chunks[0]),
        View::Detail => detail::render(f, app, chunks[0]),
    }
    status::render(f, app, chunks[1]);

    if app.show_help {
        help::render(f, app);
    }
    if let Some(confirm) = &app.pending_confirm {
        render_confirm(f, app, confirm);
    }
    if let Some(prompt) = &app.prompt {
        render_prompt(f, app, prompt);
    }
    if let Some(picker) = &app.picker {
        render_picker(f, app, picker);
    }
}

/// Category tree on the left, entry list on the right.
fn render_browse(f: &mut Frame, app: &App, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(area);

    categories::render(f, app, columns[0]);
    entries::render(f, app, columns[1]);
}

/// Centered rectangle of at most `width` x `height`.
pub(super) fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width, height)
}

pub(super) fn overlay_block<'a>(app: &App, title: impl Into<Line<'a>>) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(app.style("overlay_border"))
        .title(title)
}

fn render_confirm(f: &mut Frame, app: &App, confirm: &ConfirmAction) {
    let overlay = centered(f.area(), 54, 7);
    if overlay.width < 10 || overlay.height < 5 {
        return;
    }
    f.render_widget(Clear, overlay);

    let text = format!("{}\n\n(y) Confirm  (n/Esc) Cancel", confirm.question());
    let paragraph = Paragraph::new(text)
        .block(overlay_block(app, " Confirm "))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .style(app.style("detail_body"));
    f.render_widget(paragraph, overlay);
}

fn render_prompt(f: &mut Frame, app: &App, prompt: &Prompt) {
    let overlay = centered(f.area(), 60, 6);
    if overlay.width < 20 || overlay.height < 5 {
        return;
    }
    f.render_widget(Clear, overlay);

    let lines = vec![
        Line::from(""),
        Line::from(format!("> {}_", prompt.input)),
        Line::from(""),
        Line::from(Span::styled(
            "(Enter) Save  (Esc) Cancel",
            app.style("detail_metadata"),
        )),
    ];
    let paragraph = Paragraph::new(lines)
        .block(overlay_block(app, format!(" {} ", prompt.kind.title())))
        .style(app.style("detail_body"));
    f.render_widget(paragraph, overlay);
}

fn render_picker(f: &mut Frame, app: &App, picker: &CategoryPicker) {
    let wanted = picker.rows.len().min(20) as u16 + 2;
    let overlay = centered(f.area(), 48, wanted);
    if overlay.width < 20 || overlay.height < 3 {
        return;
    }
    f.render_widget(Clear, overlay);

    let items: Vec<ListItem> = picker
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let style = if i == picker.selected {
                app.style("category_selected")
            } else {
                app.style("category_normal")
            };
            ListItem::new(Span::styled(
                format!("{}{}", "  ".repeat(row.depth), strip_control_chars(&row.label)),
                style,
            ))
        })
        .collect();

    let title = match &picker.target {
        MoveTarget::Entry(_) => " Move entry to ",
        MoveTarget::Category(_) => " Move category under ",
    };
    let list = List::new(items).block(overlay_block(app, title));
    let mut state = ListState::default().with_selected(Some(picker.selected));
    f.render_stateful_widget(list, overlay, &mut state);
}
