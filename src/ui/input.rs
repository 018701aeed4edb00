//! Input handling for the TUI.
//!
//! Overlays capture every key while open; otherwise keys resolve through the
//! keybinding registry for the current view and focus.

use crate::app::{
    App, AppEvent, CategoryPicker, ConfirmAction, Focus, LoginMode, MoveTarget, Prompt,
    PromptKind, View,
};
use crate::keybindings::{Action as KbAction, Context as KbContext};
use crate::model::Status;
use crate::util::sanitize_label;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyModifiers};
use tokio::sync::mpsc;

use super::events::sign_out_locally;
use super::helpers::{
    spawn_add_category, spawn_add_entry, spawn_delete_category, spawn_delete_entry,
    spawn_entry_update, spawn_move_category, spawn_reload, spawn_rename_category,
    spawn_reset_password, spawn_sign_in, spawn_sign_out, spawn_sign_up, validate_login,
    EntryChange,
};
use super::Action;

fn focus_to_context(focus: Focus) -> KbContext {
    match focus {
        Focus::Categories => KbContext::Categories,
        Focus::Entries => KbContext::Entries,
    }
}

/// Main input dispatch function.
pub(super) fn handle_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Result<Action> {
    if app.show_help {
        return Ok(handle_help_input(app, code));
    }
    if app.pending_confirm.is_some() {
        return Ok(handle_confirm_input(app, code, event_tx));
    }
    if app.prompt.is_some() {
        return Ok(handle_prompt_input(app, code, modifiers, event_tx));
    }
    if app.picker.is_some() {
        return Ok(handle_picker_input(app, code, event_tx));
    }

    match app.view {
        View::Login => Ok(handle_login_input(app, code, modifiers, event_tx)),
        View::Browse if app.filter_editing => Ok(handle_filter_input(app, code, modifiers)),
        View::Browse => Ok(handle_browse_input(app, code, modifiers, event_tx)),
        View::Detail => Ok(handle_detail_input(app, code, modifiers, event_tx)),
    }
}

/// j/k/Up/Down scroll, Esc/q/? dismiss.
fn handle_help_input(app: &mut App, code: KeyCode) -> Action {
    match code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?') => {
            app.show_help = false;
            app.help_scroll_offset = 0;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.help_scroll_offset = app.help_scroll_offset.saturating_add(1);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.help_scroll_offset = app.help_scroll_offset.saturating_sub(1);
        }
        _ => {}
    }
    Action::Continue
}

fn handle_confirm_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) -> Action {
    match code {
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            if let Some(confirm) = app.pending_confirm.take() {
                execute_confirmed(app, confirm, event_tx);
            }
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            app.pending_confirm = None;
        }
        _ => {}
    }
    Action::Continue
}

fn execute_confirmed(app: &mut App, confirm: ConfirmAction, event_tx: &mpsc::Sender<AppEvent>) {
    match confirm {
        ConfirmAction::DeleteEntry { id, .. } => spawn_delete_entry(app, event_tx, id),
        ConfirmAction::DeleteCategory { id, label } => {
            spawn_delete_category(app, event_tx, id, label)
        }
        ConfirmAction::SignOut => {
            spawn_sign_out(app, event_tx);
            sign_out_locally(app);
        }
    }
}

/// Ask first when `confirm_delete` is set, otherwise act immediately.
fn request_confirm(app: &mut App, confirm: ConfirmAction, event_tx: &mpsc::Sender<AppEvent>) {
    if app.confirm_delete || confirm == ConfirmAction::SignOut {
        app.pending_confirm = Some(confirm);
    } else {
        execute_confirmed(app, confirm, event_tx);
    }
}

fn handle_prompt_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Action {
    let Some(prompt) = app.prompt.as_mut() else {
        return Action::Continue;
    };
    match code {
        KeyCode::Esc => app.prompt = None,
        KeyCode::Backspace => {
            prompt.input.pop();
        }
        KeyCode::Char(c) if !modifiers.contains(KeyModifiers::CONTROL) => prompt.input.push(c),
        KeyCode::Enter => {
            let Some(label) = sanitize_label(&prompt.input) else {
                app.set_status("Label cannot be empty");
                return Action::Continue;
            };
            if let Some(prompt) = app.prompt.take() {
                submit_prompt(app, prompt.kind, label, event_tx);
            }
        }
        _ => {}
    }
    Action::Continue
}

fn submit_prompt(app: &mut App, kind: PromptKind, label: String, event_tx: &mpsc::Sender<AppEvent>) {
    match kind {
        PromptKind::AddEntry { category } => spawn_add_entry(app, event_tx, label, category),
        PromptKind::AddCategory { parent } => spawn_add_category(app, event_tx, label, parent),
        PromptKind::RenameEntry { id } => {
            spawn_entry_update(app, event_tx, id, EntryChange::Label(label))
        }
        PromptKind::RenameCategory { id } => spawn_rename_category(app, event_tx, id, label),
    }
}

fn handle_picker_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) -> Action {
    let Some(picker) = app.picker.as_mut() else {
        return Action::Continue;
    };
    match code {
        KeyCode::Esc | KeyCode::Char('q') => app.picker = None,
        KeyCode::Char('j') | KeyCode::Down => picker.nav_down(),
        KeyCode::Char('k') | KeyCode::Up => picker.nav_up(),
        KeyCode::Enter => {
            let Some(picker) = app.picker.take() else {
                return Action::Continue;
            };
            let Some(dest) = picker.destination().cloned() else {
                return Action::Continue;
            };
            match picker.target {
                MoveTarget::Entry(id) => {
                    spawn_entry_update(app, event_tx, id, EntryChange::Category(dest.into_column()))
                }
                MoveTarget::Category(id) => {
                    spawn_move_category(app, event_tx, id, dest.into_column())
                }
            }
        }
        _ => {}
    }
    Action::Continue
}

fn handle_login_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Action {
    match code {
        KeyCode::Esc => {
            if app.login.error.is_some() || app.login.notice.is_some() {
                app.login.error = None;
                app.login.notice = None;
            } else {
                return Action::Quit;
            }
        }
        KeyCode::Char('n') if modifiers.contains(KeyModifiers::CONTROL) => app.login.cycle_mode(),
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return Action::Quit,
        KeyCode::Tab | KeyCode::BackTab => app.login.next_field(),
        KeyCode::Enter => {
            if app.login.busy {
                return Action::Continue;
            }
            if let Err(e) = validate_login(app) {
                app.login.error = Some(e);
                return Action::Continue;
            }
            app.login.error = None;
            app.login.notice = None;
            match app.login.mode {
                LoginMode::SignIn => spawn_sign_in(app, event_tx),
                LoginMode::SignUp => spawn_sign_up(app, event_tx),
                LoginMode::ResetPassword => spawn_reset_password(app, event_tx),
            }
        }
        KeyCode::Backspace => app.login.pop(),
        KeyCode::Char(c) if !modifiers.contains(KeyModifiers::CONTROL) => app.login.push(c),
        _ => {}
    }
    Action::Continue
}

/// Typing into the label filter. Enter keeps the filter, Esc clears it.
fn handle_filter_input(app: &mut App, code: KeyCode, modifiers: KeyModifiers) -> Action {
    match code {
        KeyCode::Esc => {
            app.filter.text.clear();
            app.filter_editing = false;
        }
        KeyCode::Enter => app.filter_editing = false,
        KeyCode::Backspace => {
            app.filter.text.pop();
        }
        KeyCode::Char(c) if !modifiers.contains(KeyModifiers::CONTROL) => app.filter.text.push(c),
        _ => return Action::Continue,
    }
    app.selected_entry = 0;
    app.clamp_selections();
    Action::Continue
}

fn handle_browse_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Action {
    let context = focus_to_context(app.focus);
    let Some(action) = app.keybindings.action_for_key(code, modifiers, context) else {
        return Action::Continue;
    };

    match action {
        KbAction::Quit => return Action::Quit,
        KbAction::Back => {
            if !app.filter.text.is_empty() {
                app.filter.text.clear();
                app.clamp_selections();
            } else if app.focus == Focus::Entries {
                app.focus = Focus::Categories;
            }
        }
        KbAction::NavDown => app.nav_down(),
        KbAction::NavUp => app.nav_up(),
        KbAction::CycleFocus => {
            app.focus = match app.focus {
                Focus::Categories => Focus::Entries,
                Focus::Entries => Focus::Categories,
            };
        }
        KbAction::Select => match app.focus {
            Focus::Categories => app.focus = Focus::Entries,
            Focus::Entries => {
                app.enter_detail();
            }
        },
        KbAction::CollapseCategory => app.set_cursor_collapsed(true),
        KbAction::ExpandCategory => app.set_cursor_collapsed(false),
        KbAction::AddEntry => {
            app.prompt = Some(Prompt {
                kind: PromptKind::AddEntry {
                    category: app.target_category(),
                },
                input: String::new(),
            });
        }
        KbAction::AddCategory => {
            app.prompt = Some(Prompt {
                kind: PromptKind::AddCategory {
                    parent: app.target_category(),
                },
                input: String::new(),
            });
        }
        KbAction::EnterFilter => app.filter_editing = true,
        KbAction::ToggleHideNew => toggle_hidden(app, Status::New),
        KbAction::ToggleHideWaiting => toggle_hidden(app, Status::Waiting),
        KbAction::ToggleHideUrgent => toggle_hidden(app, Status::Urgent),
        KbAction::ToggleHideDone => toggle_hidden(app, Status::Done),
        KbAction::Rename | KbAction::Move | KbAction::Delete if app.focus == Focus::Categories => {
            category_action(app, action, event_tx)
        }
        other => common_action(app, other, event_tx),
    }
    app.needs_redraw = true;
    Action::Continue
}

fn handle_detail_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Action {
    let Some(action) = app
        .keybindings
        .action_for_key(code, modifiers, KbContext::Detail)
    else {
        return Action::Continue;
    };

    match action {
        KbAction::Quit => return Action::Quit,
        KbAction::ExitDetail | KbAction::Back => app.exit_detail(),
        KbAction::ScrollDown | KbAction::NavDown => app.scroll_down(1),
        KbAction::ScrollUp | KbAction::NavUp => app.scroll_up(1),
        KbAction::PageDown => app.scroll_down(app.detail_visible_lines.max(1)),
        KbAction::PageUp => app.scroll_up(app.detail_visible_lines.max(1)),
        other => common_action(app, other, event_tx),
    }
    app.needs_redraw = true;
    Action::Continue
}

fn toggle_hidden(app: &mut App, status: Status) {
    let msg = app.toggle_hidden(status);
    app.set_status(msg);
}

/// Rename, move or delete the category under the cursor.
fn category_action(app: &mut App, action: KbAction, event_tx: &mpsc::Sender<AppEvent>) {
    let Some(category) = app.cursor_category() else {
        app.set_status("The root cannot be changed");
        return;
    };
    let id = category.id.clone();
    let label = category.display_label().to_string();
    let current = category.label.clone().unwrap_or_default();

    match action {
        KbAction::Rename => {
            app.prompt = Some(Prompt {
                kind: PromptKind::RenameCategory { id },
                input: current,
            });
        }
        KbAction::Move => {
            app.picker = Some(CategoryPicker::new(
                MoveTarget::Category(id),
                &app.cache.categories,
            ));
        }
        KbAction::Delete => {
            request_confirm(app, ConfirmAction::DeleteCategory { id, label }, event_tx);
        }
        _ => {}
    }
}

/// Actions shared by the entry list and the detail view.
fn common_action(app: &mut App, action: KbAction, event_tx: &mpsc::Sender<AppEvent>) {
    match action {
        KbAction::Refresh => spawn_reload(app, event_tx),
        KbAction::CycleTheme => {
            let name = app.cycle_theme();
            app.set_status(format!("Theme: {}", name));
        }
        KbAction::ShowHelp => {
            app.show_help = true;
            app.help_scroll_offset = 0;
        }
        KbAction::Logout => app.pending_confirm = Some(ConfirmAction::SignOut),
        KbAction::Rename
        | KbAction::Move
        | KbAction::Delete
        | KbAction::EditText
        | KbAction::SetNew
        | KbAction::SetWaiting
        | KbAction::SetUrgent
        | KbAction::SetDone => entry_action(app, action, event_tx),
        _ => {}
    }
}

fn entry_action(app: &mut App, action: KbAction, event_tx: &mpsc::Sender<AppEvent>) {
    let Some(entry) = app.action_entry() else {
        app.set_status("No entry selected");
        return;
    };
    let id = entry.id.clone();
    let label = entry.label.clone();
    let current_status = entry.status_kind();

    let status = match action {
        KbAction::SetNew => Some(Status::New),
        KbAction::SetWaiting => Some(Status::Waiting),
        KbAction::SetUrgent => Some(Status::Urgent),
        KbAction::SetDone => Some(Status::Done),
        _ => None,
    };
    if let Some(status) = status {
        if current_status != Some(status) {
            spawn_entry_update(app, event_tx, id, EntryChange::Status(status));
        }
        return;
    }

    match action {
        KbAction::Rename => {
            app.prompt = Some(Prompt {
                kind: PromptKind::RenameEntry { id },
                input: label,
            });
        }
        KbAction::Move => {
            app.picker = Some(CategoryPicker::new(
                MoveTarget::Entry(id),
                &app.cache.categories,
            ));
        }
        KbAction::Delete => {
            request_confirm(app, ConfirmAction::DeleteEntry { id, label }, event_tx);
        }
        KbAction::EditText => app.pending_edit = Some(id),
        _ => {}
    }
}
