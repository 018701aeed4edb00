use crate::app::{App, LoginField, LoginMode};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

const FORM_WIDTH: u16 = 56;

/// Render the sign-in form and, below it, the last authentication error.
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let form = &app.login;
    let width = FORM_WIDTH.min(area.width.saturating_sub(2));
    let x = area.x + area.width.saturating_sub(width) / 2;
    let height = 14u16.min(area.height);
    let y = area.y + area.height.saturating_sub(height) / 2;
    let outer = Rect::new(x, y, width, height);
    if outer.width < 20 || outer.height < 8 {
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(0)])
        .split(outer);

    let field_style = |field: LoginField| {
        if form.field == field {
            app.style("login_field_focused")
        } else {
            app.style("login_field")
        }
    };
    let cursor = |field: LoginField| if form.field == field { "_" } else { "" };

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!(" Email:    {}{}", form.email, cursor(LoginField::Email)),
            field_style(LoginField::Email),
        )),
    ];
    if form.mode.needs_password() {
        lines.push(Line::from(Span::styled(
            format!(
                " Password: {}{}",
                "*".repeat(form.password.chars().count()),
                cursor(LoginField::Password)
            ),
            field_style(LoginField::Password),
        )));
    }
    lines.push(Line::from(""));
    let action = match form.mode {
        LoginMode::SignIn => "sign in",
        LoginMode::SignUp => "sign up",
        LoginMode::ResetPassword => "send reset mail",
    };
    let hint = if form.busy {
        " Working...".to_string()
    } else {
        format!(" Enter {}  Tab next field  Ctrl+n {}  Esc quit", action, form.mode.next().title())
    };
    lines.push(Line::from(Span::styled(hint, app.style("detail_metadata"))));

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(app.style("panel_border_focused"))
            .title(format!(" apunto - {} ", form.mode.title())),
    );
    f.render_widget(paragraph, chunks[0]);

    if let Some(error) = &form.error {
        let panel = Paragraph::new(vec![
            Line::from(Span::styled(error.name.clone(), app.style("login_error"))),
            Line::from(error.message.clone()),
        ])
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(app.style("login_error"))
                .title(" Error "),
        );
        f.render_widget(panel, chunks[1]);
    } else if let Some(notice) = &form.notice {
        let panel = Paragraph::new(notice.as_str())
            .wrap(Wrap { trim: true })
            .style(app.style("detail_metadata"));
        f.render_widget(panel, chunks[1]);
    }
}
