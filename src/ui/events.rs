//! Application event handling.
//!
//! Applies background task results to the cache and view state. Successful
//! mutations patch the cache in place; failures only surface a status message
//! since the store has already logged the cause.

use crate::app::{App, AppEvent, LoginMode, View};
use crate::remote::session;
use crate::store::CategoryDeletion;
use tokio::sync::mpsc;

use super::helpers::spawn_reload;

/// Handle one event from a background task.
pub(super) fn handle_app_event(app: &mut App, event: AppEvent, event_tx: &mpsc::Sender<AppEvent>) {
    match event {
        AppEvent::Loaded(Some((entries, categories))) => {
            app.loading = false;
            tracing::debug!(
                entries = entries.len(),
                categories = categories.len(),
                "Data loaded"
            );
            app.apply_snapshot(entries, categories);
        }
        AppEvent::Loaded(None) => {
            app.loading = false;
            app.set_status("Failed to load data (Ctrl+r to retry)");
        }
        AppEvent::EntryAdded(Some(entry)) => {
            let id = entry.id.clone();
            app.cache.push_entry(entry);
            app.refresh_derived();
            if let Some(idx) = app.visible_entries().iter().position(|e| e.id == id) {
                app.selected_entry = idx;
            }
            app.set_status("Entry added");
        }
        AppEvent::EntryAdded(None) => app.set_status("Add entry failed"),
        AppEvent::EntryUpdated { id, action, result } => match result {
            Some(entry) => {
                if !app.cache.replace_entry(entry) {
                    tracing::debug!(entry_id = %id, "Updated entry no longer cached");
                }
                app.refresh_derived();
            }
            None => app.set_status(format!("{} failed", action)),
        },
        AppEvent::EntryDeleted { id, deleted } => {
            if deleted {
                app.cache.remove_entry(&id);
                if app.view == View::Detail && app.detail_id.as_deref() == Some(id.as_str()) {
                    app.exit_detail();
                }
                app.refresh_derived();
                app.set_status("Entry deleted");
            } else {
                app.set_status("Delete failed");
            }
        }
        AppEvent::CategoryAdded(Some(category)) => {
            app.cache.push_category(category);
            app.refresh_derived();
            app.set_status("Category added");
        }
        AppEvent::CategoryAdded(None) => app.set_status("Add category failed"),
        AppEvent::CategoryUpdated { id, action, result } => match result {
            Some(category) => {
                if !app.cache.replace_category(category) {
                    tracing::debug!(category_id = %id, "Updated category no longer cached");
                }
                app.refresh_derived();
            }
            None => app.set_status(format!("{} failed", action)),
        },
        AppEvent::CategoryDeleted {
            label,
            outcome,
            reload,
        } => {
            app.loading = false;
            if let Some((entries, categories)) = reload {
                app.apply_snapshot(entries, categories);
            }
            let msg = match outcome {
                CategoryDeletion::Completed {
                    children_moved,
                    entries_moved,
                } => format!(
                    "Deleted \"{}\" ({} subcategories, {} entries moved up)",
                    label, children_moved, entries_moved
                ),
                CategoryDeletion::Aborted { step } => format!(
                    "Deleting \"{}\" stopped while {}; delete again to finish",
                    label, step
                ),
                CategoryDeletion::NotFound => format!("Category \"{}\" not found", label),
            };
            app.set_status(msg);
        }
        AppEvent::SignedIn(new_session) => {
            if let Err(e) = session::save(&app.session_path, &new_session) {
                tracing::warn!(error = %e, "Failed to persist session");
                app.set_status("Signed in (session not saved)");
            }
            tracing::info!(user = %new_session.display_user(), "Signed in");
            app.begin_session(new_session);
            spawn_reload(app, event_tx);
        }
        AppEvent::SessionRefreshed(fresh) => {
            app.refreshing_session = false;
            if let Err(e) = session::save(&app.session_path, &fresh) {
                tracing::warn!(error = %e, "Failed to persist refreshed session");
            }
            tracing::debug!("Session refreshed");
            app.replace_session(fresh);
        }
        AppEvent::SessionExpired(error) => {
            app.refreshing_session = false;
            tracing::warn!(error = %error, "Session could not be refreshed");
            sign_out_locally(app);
            app.login.error = Some(error);
        }
        AppEvent::SignUpPending => {
            app.login.busy = false;
            app.login.mode = LoginMode::SignIn;
            app.login.notice =
                Some("Check your inbox to confirm the account, then sign in.".to_string());
        }
        AppEvent::ResetMailSent => {
            app.login.busy = false;
            app.login.notice =
                Some("If the address is registered, a reset link is on its way.".to_string());
        }
        AppEvent::AuthFailed(error) => {
            app.login.busy = false;
            app.login.password.clear();
            app.login.error = Some(error);
        }
        AppEvent::SignedOut => app.set_status("Signed out"),
        AppEvent::TaskPanicked { task, error } => {
            tracing::error!(task, error, "Background task panicked");
            app.loading = false;
            app.login.busy = false;
            app.set_status(format!("Internal error in {} task", task));
        }
    }
}

/// Forget the stored session and return to the login form.
pub(super) fn sign_out_locally(app: &mut App) {
    if let Err(e) = session::clear(&app.session_path) {
        tracing::warn!(error = %e, "Failed to remove session file");
    }
    app.end_session();
}
