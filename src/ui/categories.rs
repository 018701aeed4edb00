use crate::app::{App, Focus};
use crate::tree::NodeRef;
use crate::util::strip_control_chars;
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};
use std::collections::HashMap;

/// Render the category tree panel.
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 3 || area.height < 3 {
        return;
    }

    let is_focused = app.focus == Focus::Categories;
    let rows = app.tree_rows();

    // Entries filed directly under each node.
    let mut counts: HashMap<NodeRef, usize> = HashMap::new();
    for entry in &app.cache.entries {
        *counts
            .entry(NodeRef::for_entry(entry.category.as_ref()))
            .or_default() += 1;
    }

    let items: Vec<ListItem> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let icon = match (row.has_children, row.is_expanded) {
                (true, true) => "v ",
                (true, false) => "> ",
                (false, _) => "  ",
            };

            let style = if i == app.category_cursor {
                if is_focused {
                    app.style("category_selected")
                } else {
                    app.style("category_root")
                }
            } else if row.node == NodeRef::Root {
                app.style("category_root")
            } else {
                app.style("category_normal")
            };
            let count = counts.get(&row.node).copied().unwrap_or(0);

            let mut spans = vec![
                Span::styled(format!("{}{}", "  ".repeat(row.depth), icon), style),
                Span::styled(strip_control_chars(&row.label).into_owned(), style),
            ];
            if count > 0 {
                spans.push(Span::styled(format!(" ({})", count), style));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let border_style = if is_focused {
        app.style("panel_border_focused")
    } else {
        app.style("panel_border")
    };

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title("Categories"),
        )
        .highlight_style(Style::default());

    let mut state = ListState::default().with_selected(Some(app.category_cursor));
    f.render_stateful_widget(list, area, &mut state);
}
