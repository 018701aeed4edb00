//! Background task spawning.
//!
//! Every remote call runs on its own tokio task and reports back through the
//! app event channel. Handlers clone what they need from [`App`] up front so
//! the loop never blocks on the network.

use crate::app::{App, AppEvent};
use crate::model::{Category, CategoryId, EntryId, NewCategory, NewEntry, Status};
use crate::remote::{AuthError, SignUpOutcome};
use crate::store::ops;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;

/// Wraps a future to catch panics and convert them to errors.
///
/// A panicking task would otherwise vanish inside the runtime; this turns the
/// payload into an `Err(String)` the loop can report.
pub(super) async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else if let Some(e) = panic.downcast_ref::<Box<dyn std::error::Error + Send>>() {
                e.to_string()
            } else {
                format!("Unknown panic: {:?}", (*panic).type_id())
            }
        })
}

/// Run `future` on a new task and send its event, or `TaskPanicked`.
pub(super) fn spawn_event<F>(tx: &mpsc::Sender<AppEvent>, task: &'static str, future: F)
where
    F: Future<Output = AppEvent> + Send + 'static,
{
    let tx = tx.clone();
    tokio::spawn(async move {
        let event = match catch_task_panic(future).await {
            Ok(event) => event,
            Err(panic_msg) => {
                tracing::error!(task, error = %panic_msg, "Background task panicked");
                AppEvent::TaskPanicked {
                    task,
                    error: panic_msg,
                }
            }
        };
        if let Err(e) = tx.send(event).await {
            tracing::warn!(error = %e, task, "Channel send failed (receiver dropped)");
        }
    });
}

// ============================================================================
// Data
// ============================================================================

/// Reload both collections.
pub(super) fn spawn_reload(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    app.loading = true;
    app.needs_redraw = true;
    let backend = app.backend.clone();
    spawn_event(tx, "reload", async move {
        AppEvent::Loaded(ops::load_all(&backend).await)
    });
}

pub(super) fn spawn_add_entry(
    app: &App,
    tx: &mpsc::Sender<AppEvent>,
    label: String,
    category: Option<CategoryId>,
) {
    let backend = app.backend.clone();
    spawn_event(tx, "add_entry", async move {
        AppEvent::EntryAdded(ops::add_entry(&backend, NewEntry::new(label, category)).await)
    });
}

/// Change of a single entry field, reported back as `EntryUpdated`.
pub(super) enum EntryChange {
    Status(Status),
    Label(String),
    Category(Option<CategoryId>),
    Text(Option<String>),
}

impl EntryChange {
    fn action(&self) -> &'static str {
        match self {
            Self::Status(_) => "Status change",
            Self::Label(_) => "Rename",
            Self::Category(_) => "Move",
            Self::Text(_) => "Text update",
        }
    }
}

pub(super) fn spawn_entry_update(
    app: &App,
    tx: &mpsc::Sender<AppEvent>,
    id: EntryId,
    change: EntryChange,
) {
    let backend = app.backend.clone();
    let action = change.action();
    spawn_event(tx, "update_entry", async move {
        let result = match change {
            EntryChange::Status(status) => ops::set_status(&backend, id.clone(), status).await,
            EntryChange::Label(label) => ops::rename_entry(&backend, id.clone(), &label).await,
            EntryChange::Category(category) => {
                ops::move_entry(&backend, id.clone(), category).await
            }
            EntryChange::Text(text) => ops::set_entry_text(&backend, id.clone(), text).await,
        };
        AppEvent::EntryUpdated { id, action, result }
    });
}

pub(super) fn spawn_delete_entry(app: &App, tx: &mpsc::Sender<AppEvent>, id: EntryId) {
    let backend = app.backend.clone();
    spawn_event(tx, "delete_entry", async move {
        let deleted = ops::delete_entry(&backend, &id).await;
        AppEvent::EntryDeleted { id, deleted }
    });
}

pub(super) fn spawn_add_category(
    app: &App,
    tx: &mpsc::Sender<AppEvent>,
    label: String,
    parent: Option<CategoryId>,
) {
    let backend = app.backend.clone();
    spawn_event(tx, "add_category", async move {
        AppEvent::CategoryAdded(ops::add_category(&backend, NewCategory { label, parent }).await)
    });
}

pub(super) fn spawn_rename_category(
    app: &App,
    tx: &mpsc::Sender<AppEvent>,
    id: CategoryId,
    label: String,
) {
    let backend = app.backend.clone();
    spawn_event(tx, "rename_category", async move {
        let result = ops::rename_category(&backend, id.clone(), &label).await;
        AppEvent::CategoryUpdated {
            id,
            action: "Rename",
            result,
        }
    });
}

pub(super) fn spawn_move_category(
    app: &App,
    tx: &mpsc::Sender<AppEvent>,
    id: CategoryId,
    parent: Option<CategoryId>,
) {
    let backend = app.backend.clone();
    let categories: Vec<Category> = app.cache.categories.clone();
    spawn_event(tx, "move_category", async move {
        let result = ops::move_category(&backend, &categories, id.clone(), parent).await;
        AppEvent::CategoryUpdated {
            id,
            action: "Move",
            result,
        }
    });
}

/// Cascade-delete a category, then reload whatever the outcome.
pub(super) fn spawn_delete_category(
    app: &mut App,
    tx: &mpsc::Sender<AppEvent>,
    id: CategoryId,
    label: String,
) {
    app.loading = true;
    let backend = app.backend.clone();
    let categories = app.cache.categories.clone();
    spawn_event(tx, "delete_category", async move {
        let outcome = ops::delete_category(&backend, &categories, &id).await;
        let reload = ops::load_all(&backend).await;
        AppEvent::CategoryDeleted {
            label,
            outcome,
            reload,
        }
    });
}

// ============================================================================
// Authentication
// ============================================================================

pub(super) fn spawn_sign_in(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    app.login.busy = true;
    let auth = app.auth.clone();
    let email = app.login.email.trim().to_string();
    let password = app.login.password.clone();
    spawn_event(tx, "sign_in", async move {
        match auth.sign_in(&email, &password).await {
            Ok(session) => AppEvent::SignedIn(session),
            Err(e) => AppEvent::AuthFailed(e),
        }
    });
}

pub(super) fn spawn_sign_up(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    app.login.busy = true;
    let auth = app.auth.clone();
    let email = app.login.email.trim().to_string();
    let password = app.login.password.clone();
    spawn_event(tx, "sign_up", async move {
        match auth.sign_up(&email, &password).await {
            Ok(SignUpOutcome::SignedIn(session)) => AppEvent::SignedIn(session),
            Ok(SignUpOutcome::ConfirmationSent) => AppEvent::SignUpPending,
            Err(e) => AppEvent::AuthFailed(e),
        }
    });
}

pub(super) fn spawn_reset_password(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    app.login.busy = true;
    let auth = app.auth.clone();
    let email = app.login.email.trim().to_string();
    let redirect = app.reset_redirect.clone();
    spawn_event(tx, "reset_password", async move {
        match auth.reset_password(&email, redirect.as_ref()).await {
            Ok(()) => AppEvent::ResetMailSent,
            Err(e) => AppEvent::AuthFailed(e),
        }
    });
}

/// Revoke the session server-side. The local sign-out happens regardless.
pub(super) fn spawn_sign_out(app: &App, tx: &mpsc::Sender<AppEvent>) {
    let Some(session) = app.session.clone() else {
        return;
    };
    let auth = app.auth.clone();
    spawn_event(tx, "sign_out", async move {
        if let Err(e) = auth.sign_out(&session).await {
            tracing::warn!(error = %e, "Server-side sign-out failed");
        }
        AppEvent::SignedOut
    });
}

/// Exchange the refresh token for a new session, at most one at a time.
pub(super) fn spawn_refresh_session(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    if app.refreshing_session {
        return;
    }
    let Some(session) = app.session.clone() else {
        return;
    };
    app.refreshing_session = true;
    let auth = app.auth.clone();
    spawn_event(tx, "refresh_session", async move {
        match auth.refresh(&session).await {
            Ok(fresh) => AppEvent::SessionRefreshed(fresh),
            Err(e) => AppEvent::SessionExpired(e),
        }
    });
}

/// Client-side check shared by the sign-in forms.
pub(super) fn validate_login(app: &App) -> Result<(), AuthError> {
    let email = app.login.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AuthError::invalid_input("Enter a valid email address"));
    }
    if app.login.mode.needs_password() && app.login.password.is_empty() {
        return Err(AuthError::invalid_input("Enter a password"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use crate::app::LoginMode;

    #[tokio::test]
    async fn test_catch_task_panic_reports_message() {
        let result: Result<(), String> = catch_task_panic(async { panic!("boom") }).await;
        assert_eq!(result.unwrap_err(), "boom");
    }

    #[tokio::test]
    async fn test_spawn_event_forwards_panic() {
        let (tx, mut rx) = mpsc::channel(4);
        spawn_event(&tx, "explode", async {
            panic!("{}", String::from("owned message"));
        });
        match rx.recv().await {
            Some(AppEvent::TaskPanicked { task, error }) => {
                assert_eq!(task, "explode");
                assert_eq!(error, "owned message");
            }
            _ => panic!("expected TaskPanicked"),
        }
    }

    #[test]
    fn test_validate_login() {
        let mut app = test_app();
        assert!(validate_login(&app).is_err());

        app.login.email = "ana@example.com".to_string();
        assert!(validate_login(&app).is_err());

        app.login.password = "hunter22".to_string();
        assert!(validate_login(&app).is_ok());

        app.login.password.clear();
        app.login.mode = LoginMode::ResetPassword;
        assert!(validate_login(&app).is_ok());
    }

    #[tokio::test]
    async fn test_refresh_is_not_doubled() {
        let (tx, _rx) = mpsc::channel(4);
        let mut app = test_app();
        app.begin_session(crate::app::tests::session());
        spawn_refresh_session(&mut app, &tx);
        assert!(app.refreshing_session);
        // A second call is a no-op while the first is outstanding.
        spawn_refresh_session(&mut app, &tx);
        assert!(app.refreshing_session);
    }
}
