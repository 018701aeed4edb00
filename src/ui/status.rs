use crate::app::{App, View};
use ratatui::{layout::Rect, widgets::Paragraph, Frame};
use std::borrow::Cow;

/// Render the status bar
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 1 || area.height < 1 {
        return;
    }

    let text: Cow<'_, str> = if let Some((msg, _)) = &app.status_message {
        Cow::Borrowed(msg.as_ref())
    } else if app.loading {
        Cow::Borrowed("Loading...")
    } else {
        match app.view {
            View::Login => Cow::Borrowed("Not signed in"),
            View::Browse if app.filter_editing => {
                Cow::Borrowed("Type to filter | Enter keep | Esc clear")
            }
            View::Browse => {
                let user = app
                    .session
                    .as_ref()
                    .map(|s| s.display_user())
                    .unwrap_or_default();
                Cow::Owned(format!(
                    "{} | [a]dd [r]ename [m]ove [d]elete [1-4]status [/]filter [?]help [q]uit",
                    user
                ))
            }
            View::Detail => {
                Cow::Borrowed("[b]ack [j/k]scroll [e]dit [1-4]status [m]ove [d]elete [q]uit")
            }
        }
    };

    let paragraph = Paragraph::new(text).style(app.style("status_bar"));
    f.render_widget(paragraph, area);
}
