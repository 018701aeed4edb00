//! Main event loop for the TUI.
//!
//! Multiplexes terminal input, background task events and a periodic tick.

use crate::app::{App, AppEvent};
use crate::editor;
use crate::model::EntryId;
use anyhow::Result;
use chrono::Utc;
use crossterm::{
    event::{Event, EventStream},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::time::Duration;
use tokio::sync::mpsc;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use super::events::handle_app_event;
use super::helpers::{spawn_entry_update, spawn_refresh_session, spawn_reload, EntryChange};
use super::input::handle_input;
use super::render::render;

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Result of handling a key press event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Continue the event loop and process more events.
    Continue,
    /// Exit the application and restore the terminal.
    Quit,
}

/// Runs the TUI application event loop.
///
/// Uses `tokio::select!` over shutdown signals, crossterm's async event
/// stream, the [`AppEvent`] channel and a 250ms tick. A panic hook restores
/// the terminal before unwinding so a crash never leaves it in raw mode.
pub async fn run(
    app: &mut App,
    event_tx: mpsc::Sender<AppEvent>,
    mut event_rx: mpsc::Receiver<AppEvent>,
) -> Result<()> {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let mut terminal = setup_terminal()?;
    let mut event_stream = EventStream::new();
    let mut tick_interval = tokio::time::interval(Duration::from_millis(250));

    #[cfg(unix)]
    let mut sigterm = signal(SignalKind::terminate())?;
    #[cfg(unix)]
    let mut sigint = signal(SignalKind::interrupt())?;

    if app.is_signed_in() {
        spawn_reload(app, &event_tx);
    }

    loop {
        if app.needs_redraw {
            terminal.draw(|f| render(f, app))?;
            app.needs_redraw = false;
        }

        if app.clear_expired_status() {
            app.needs_redraw = true;
        }

        // Drain finished background work before waiting on input again.
        while let Ok(event) = event_rx.try_recv() {
            app.needs_redraw = true;
            handle_app_event(app, event, &event_tx);
        }

        #[cfg(unix)]
        let sigterm_fut = sigterm.recv();
        #[cfg(not(unix))]
        let sigterm_fut = std::future::pending::<Option<()>>();

        #[cfg(unix)]
        let sigint_fut = sigint.recv();
        #[cfg(not(unix))]
        let sigint_fut = std::future::pending::<Option<()>>();

        tokio::select! {
            biased;

            _ = sigterm_fut => {
                tracing::info!("Received SIGTERM, shutting down gracefully");
                break;
            }

            _ = sigint_fut => {
                tracing::info!("Received SIGINT, shutting down gracefully");
                break;
            }

            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) => {
                        app.needs_redraw = true;
                        match handle_input(app, key.code, key.modifiers, &event_tx) {
                            Ok(Action::Quit) => break,
                            Ok(Action::Continue) => {}
                            Err(e) => app.set_status(format!("Error: {}", e)),
                        }
                    }
                    Some(Ok(Event::Resize(_, _))) => app.needs_redraw = true,
                    _ => {}
                }
            }

            Some(event) = event_rx.recv() => {
                app.needs_redraw = true;
                handle_app_event(app, event, &event_tx);
            }

            _ = tick_interval.tick() => {
                handle_tick(app, &event_tx);
            }
        }

        // The editor owns the terminal while it runs, so the input stream is
        // dropped first and recreated afterwards.
        if let Some(id) = app.pending_edit.take() {
            drop(event_stream);
            edit_entry_text(app, &mut terminal, id, &event_tx).await?;
            event_stream = EventStream::new();
        }
    }

    restore_terminal(terminal)?;
    Ok(())
}

/// Periodic housekeeping: refresh the access token once it has expired or
/// the backend has refused it. A failed refresh ends the session.
fn handle_tick(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let Some(session) = app.session.as_ref() else {
        return;
    };
    let expired = session.is_expired(Utc::now());
    let rejected = app.backend.take_rejection();
    if (expired || rejected) && !app.refreshing_session {
        tracing::debug!(expired, rejected, "Refreshing access token");
        spawn_refresh_session(app, event_tx);
    }
}

/// Hand the terminal to the external editor and save what comes back.
async fn edit_entry_text(
    app: &mut App,
    terminal: &mut Tui,
    id: EntryId,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Result<()> {
    let Some(entry) = app.cache.entry(&id) else {
        app.set_status("Entry no longer exists");
        return Ok(());
    };
    let initial = entry.text.clone().unwrap_or_default();
    let command = app.editor.clone();

    suspend_terminal(terminal)?;
    let result =
        tokio::task::spawn_blocking(move || editor::edit_text(&command, &initial)).await;
    resume_terminal(terminal)?;
    app.needs_redraw = true;

    match result {
        Ok(Ok(Some(text))) => {
            let text = (!text.trim().is_empty()).then_some(text);
            spawn_entry_update(app, event_tx, id, EntryChange::Text(text));
        }
        Ok(Ok(None)) => app.set_status("Text unchanged"),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Editor failed");
            app.set_status(format!("Editor failed: {}", e));
        }
        Err(e) => {
            tracing::error!(error = %e, "Editor task failed");
            app.set_status("Editor failed");
        }
    }
    Ok(())
}

/// Set up the terminal for TUI rendering.
fn setup_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn suspend_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn resume_terminal(terminal: &mut Tui) -> Result<()> {
    enable_raw_mode()?;
    execute!(terminal.backend_mut(), EnterAlternateScreen)?;
    terminal.clear()?;
    Ok(())
}

/// Restore terminal to normal state.
fn restore_terminal(mut terminal: Tui) -> Result<()> {
    suspend_terminal(&mut terminal)
}
