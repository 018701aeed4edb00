//! Scriptable subcommands over the same store the TUI uses.
//!
//! Each command loads the stored session (refreshing it when expired), runs
//! one store operation and prints the result. Failures end in an `Err`, which
//! `main` turns into a non-zero exit.

use crate::config::{Config, Connection};
use crate::editor;
use crate::filter::{visible_entries, EntryFilter, Selection};
use crate::model::{Category, CategoryId, Entry, NewCategory, NewEntry, Status};
use crate::remote::{session, AuthClient, PostgrestClient, Session, SignUpOutcome};
use crate::store::{CategoryDeletion, EntryStore};
use crate::tree::{build_tree, flatten, label_path, NodeRef, ROOT_LABEL};
use crate::util::{format_relative_time, strip_control_chars};
use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::collections::HashSet;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "apunto", version, about = "Terminal task and notes manager")]
pub struct Args {
    /// Config file to use instead of ~/.config/apunto/config.toml
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in and store the session
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account
    Signup {
        #[arg(long)]
        email: Option<String>,
    },
    /// Send a password reset mail
    ResetPassword { email: String },
    /// Change the signed-in user's password
    UpdatePassword,
    /// Sign out and forget the stored session
    Logout,
    /// List entries
    List {
        /// Only entries in this category (id or label) and its subcategories
        #[arg(long)]
        category: Option<String>,
        /// Hide entries with this status (repeatable)
        #[arg(long, value_name = "STATUS")]
        hide: Vec<String>,
        /// Case-insensitive label filter
        #[arg(long)]
        filter: Option<String>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Add an entry
    Add {
        label: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, value_name = "STATUS")]
        status: Option<String>,
        /// Markdown body
        #[arg(long)]
        text: Option<String>,
    },
    /// Show one entry with its text
    Show { id: String },
    /// Set an entry's status (new, waiting, urgent, done)
    Status { id: String, status: String },
    /// Rename an entry
    Rename { id: String, label: String },
    /// Move an entry; without --category it moves to the root
    Move {
        id: String,
        #[arg(long)]
        category: Option<String>,
    },
    /// Edit an entry's text in $EDITOR
    Edit { id: String },
    /// Delete an entry
    Delete { id: String },
    /// Print the category tree
    Categories {
        #[arg(long)]
        json: bool,
    },
    /// Manage categories
    Category {
        #[command(subcommand)]
        command: CategoryCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommand {
    /// Add a category
    Add {
        label: String,
        #[arg(long)]
        parent: Option<String>,
    },
    /// Rename a category
    Rename { id: String, label: String },
    /// Re-parent a category; without --parent it moves to the top level
    Move {
        id: String,
        #[arg(long)]
        parent: Option<String>,
    },
    /// Delete a category, moving its children and entries up one level
    Delete { id: String },
}

// ============================================================================
// Session
// ============================================================================

/// Load the stored session, refreshing it when expired.
///
/// A session that can no longer be refreshed is removed so the next run
/// starts signed out.
pub async fn restore_session(auth: &AuthClient, path: &Path) -> Result<Option<Session>> {
    let Some(stored) = session::load(path).context("Failed to load session")? else {
        return Ok(None);
    };
    if !stored.is_expired(Utc::now()) {
        return Ok(Some(stored));
    }

    tracing::debug!("Stored session expired, refreshing");
    match auth.refresh(&stored).await {
        Ok(fresh) => {
            if let Err(e) = session::save(path, &fresh) {
                tracing::warn!(error = %e, "Failed to persist refreshed session");
            }
            Ok(Some(fresh))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Session refresh failed, signing out");
            if let Err(e) = session::clear(path) {
                tracing::warn!(error = %e, "Failed to remove session file");
            }
            Ok(None)
        }
    }
}

/// Clients shared by every command.
struct Remote {
    anon: PostgrestClient,
    auth: AuthClient,
    session_path: PathBuf,
}

impl Remote {
    fn new(connection: Connection, session_path: PathBuf) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            anon: PostgrestClient::new(
                http.clone(),
                connection.url.clone(),
                connection.anon_key.clone(),
            ),
            auth: AuthClient::new(http, connection.url, connection.anon_key),
            session_path,
        })
    }

    async fn require_session(&self) -> Result<Session> {
        restore_session(&self.auth, &self.session_path)
            .await?
            .ok_or_else(|| anyhow!("Not signed in. Run `apunto login` first."))
    }

    /// Signed-in store with both collections loaded.
    async fn store(&self) -> Result<EntryStore<PostgrestClient>> {
        let session = self.require_session().await?;
        let mut store = EntryStore::new(self.anon.with_access_token(session.access_secret()));
        if !store.refresh().await {
            bail!("Failed to load data from the backend (RUST_LOG=apunto=debug for details)");
        }
        Ok(store)
    }
}

// ============================================================================
// Dispatch
// ============================================================================

pub async fn run(command: Command, config: &Config, config_dir: &Path) -> Result<()> {
    let connection = config.connection()?;
    let remote = Remote::new(connection, session::session_path(config_dir))?;

    match command {
        Command::Login { email } => login(&remote, email).await,
        Command::Signup { email } => signup(&remote, email).await,
        Command::ResetPassword { email } => {
            let redirect = config.reset_redirect()?;
            remote.auth.reset_password(&email, redirect.as_ref()).await?;
            println!("If {} is registered, a reset link is on its way.", email);
            Ok(())
        }
        Command::UpdatePassword => {
            let session = remote.require_session().await?;
            let password = read_password("New password: ")?;
            let again = read_password("Repeat new password: ")?;
            if password != again {
                bail!("Passwords do not match");
            }
            remote.auth.update_password(&session, &password).await?;
            println!("Password updated");
            Ok(())
        }
        Command::Logout => {
            if let Some(session) = session::load(&remote.session_path)? {
                if let Err(e) = remote.auth.sign_out(&session).await {
                    tracing::warn!(error = %e, "Server-side sign-out failed");
                }
            }
            session::clear(&remote.session_path)?;
            println!("Signed out");
            Ok(())
        }
        Command::List {
            category,
            hide,
            filter,
            json,
        } => {
            let store = remote.store().await?;
            list(&store, category.as_deref(), &hide, filter, json)
        }
        Command::Add {
            label,
            category,
            status,
            text,
        } => {
            let mut store = remote.store().await?;
            let category = category
                .as_deref()
                .map(|c| resolve_category(store.categories(), c))
                .transpose()?;
            let mut new = NewEntry::new(label, category);
            if let Some(status) = status {
                new.status = parse_status(&status)?.bits();
            }
            new.text = text;
            let entry = store
                .add_entry(new)
                .await
                .ok_or_else(|| anyhow!("Failed to add entry"))?;
            println!("{}", entry.id);
            Ok(())
        }
        Command::Show { id } => {
            let store = remote.store().await?;
            let entry = resolve_entry(store.entries(), &id)?;
            show(entry, store.categories());
            Ok(())
        }
        Command::Status { id, status } => {
            let status = parse_status(&status)?;
            let mut store = remote.store().await?;
            let id = resolve_entry(store.entries(), &id)?.id.clone();
            let entry = store
                .set_status(&id, status)
                .await
                .ok_or_else(|| anyhow!("Failed to update entry {}", id))?;
            print_entry_line(&entry, store.categories());
            Ok(())
        }
        Command::Rename { id, label } => {
            let mut store = remote.store().await?;
            let id = resolve_entry(store.entries(), &id)?.id.clone();
            let entry = store
                .rename_entry(&id, &label)
                .await
                .ok_or_else(|| anyhow!("Failed to rename entry {}", id))?;
            print_entry_line(&entry, store.categories());
            Ok(())
        }
        Command::Move { id, category } => {
            let mut store = remote.store().await?;
            let id = resolve_entry(store.entries(), &id)?.id.clone();
            let category = category
                .as_deref()
                .map(|c| resolve_category(store.categories(), c))
                .transpose()?;
            let entry = store
                .move_entry(&id, category)
                .await
                .ok_or_else(|| anyhow!("Failed to move entry {}", id))?;
            print_entry_line(&entry, store.categories());
            Ok(())
        }
        Command::Edit { id } => {
            let mut store = remote.store().await?;
            let entry = resolve_entry(store.entries(), &id)?;
            let id = entry.id.clone();
            let initial = entry.text.clone().unwrap_or_default();
            let command = config.editor_command();
            let edited =
                tokio::task::spawn_blocking(move || editor::edit_text(&command, &initial))
                    .await
                    .context("Editor task failed")??;
            let Some(text) = edited else {
                println!("Text unchanged");
                return Ok(());
            };
            let text = (!text.trim().is_empty()).then_some(text);
            store
                .set_entry_text(&id, text)
                .await
                .ok_or_else(|| anyhow!("Failed to save text of entry {}", id))?;
            println!("Saved");
            Ok(())
        }
        Command::Delete { id } => {
            let mut store = remote.store().await?;
            let id = resolve_entry(store.entries(), &id)?.id.clone();
            if !store.delete_entry(&id).await {
                bail!("Failed to delete entry {}", id);
            }
            println!("Deleted {}", id);
            Ok(())
        }
        Command::Categories { json } => {
            let store = remote.store().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(store.categories())?);
            } else {
                print_tree(store.categories());
            }
            Ok(())
        }
        Command::Category { command } => category(&remote, command).await,
    }
}

async fn login(remote: &Remote, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(e) => e,
        None => read_line("Email: ")?,
    };
    let password = read_password("Password: ")?;
    let session = remote.auth.sign_in(&email, &password).await?;
    session::save(&remote.session_path, &session).context("Failed to save session")?;
    println!("Signed in as {}", session.display_user());
    Ok(())
}

async fn signup(remote: &Remote, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(e) => e,
        None => read_line("Email: ")?,
    };
    let password = read_password("Password: ")?;
    match remote.auth.sign_up(&email, &password).await? {
        SignUpOutcome::SignedIn(session) => {
            session::save(&remote.session_path, &session).context("Failed to save session")?;
            println!("Account created, signed in as {}", session.display_user());
        }
        SignUpOutcome::ConfirmationSent => {
            println!("Check your inbox to confirm the account, then run `apunto login`.");
        }
    }
    Ok(())
}

async fn category(remote: &Remote, command: CategoryCommand) -> Result<()> {
    let mut store = remote.store().await?;
    match command {
        CategoryCommand::Add { label, parent } => {
            let parent = parent
                .as_deref()
                .map(|p| resolve_category(store.categories(), p))
                .transpose()?;
            let category = store
                .add_category(NewCategory { label, parent })
                .await
                .ok_or_else(|| anyhow!("Failed to add category"))?;
            println!("{}", category.id);
        }
        CategoryCommand::Rename { id, label } => {
            let id = resolve_category(store.categories(), &id)?;
            store
                .rename_category(&id, &label)
                .await
                .ok_or_else(|| anyhow!("Failed to rename category {}", id))?;
            println!("Renamed {}", id);
        }
        CategoryCommand::Move { id, parent } => {
            let id = resolve_category(store.categories(), &id)?;
            let parent = parent
                .as_deref()
                .map(|p| resolve_category(store.categories(), p))
                .transpose()?;
            store
                .move_category(&id, parent)
                .await
                .ok_or_else(|| anyhow!("Failed to move category {} (a category cannot move into its own subtree)", id))?;
            println!("Moved {}", id);
        }
        CategoryCommand::Delete { id } => {
            let id = resolve_category(store.categories(), &id)?;
            match store.delete_category(&id).await {
                CategoryDeletion::Completed {
                    children_moved,
                    entries_moved,
                } => println!(
                    "Deleted {} ({} subcategories, {} entries moved up)",
                    id, children_moved, entries_moved
                ),
                CategoryDeletion::Aborted { step } => {
                    bail!("Deleting {} stopped while {}; run the command again to finish", id, step)
                }
                CategoryDeletion::NotFound => bail!("Category {} not found", id),
            }
        }
    }
    Ok(())
}

// ============================================================================
// Lookups
// ============================================================================

/// Find an entry by exact id, or by a unique id prefix.
fn resolve_entry<'a>(entries: &'a [Entry], query: &str) -> Result<&'a Entry> {
    if let Some(entry) = entries.iter().find(|e| e.id == query) {
        return Ok(entry);
    }
    let mut matches = entries.iter().filter(|e| e.id.starts_with(query));
    match (matches.next(), matches.next()) {
        (Some(entry), None) if !query.is_empty() => Ok(entry),
        (Some(_), Some(_)) => bail!("Entry id {} is ambiguous", query),
        _ => bail!("Entry {} not found", query),
    }
}

/// Find a category by exact id, or by a unique case-insensitive label.
fn resolve_category(categories: &[Category], query: &str) -> Result<CategoryId> {
    if let Some(category) = categories.iter().find(|c| c.id == query) {
        return Ok(category.id.clone());
    }
    let wanted = query.to_lowercase();
    let mut matches = categories
        .iter()
        .filter(|c| c.label.as_deref().is_some_and(|l| l.to_lowercase() == wanted));
    match (matches.next(), matches.next()) {
        (Some(category), None) => Ok(category.id.clone()),
        (Some(_), Some(_)) => bail!("Category name {} is ambiguous, use its id", query),
        _ => bail!("Category {} not found", query),
    }
}

fn parse_status(name: &str) -> Result<Status> {
    Status::from_str_name(name)
        .ok_or_else(|| anyhow!("Unknown status {} (expected new, waiting, urgent or done)", name))
}

// ============================================================================
// Output
// ============================================================================

fn list(
    store: &EntryStore<PostgrestClient>,
    category: Option<&str>,
    hide: &[String],
    text: Option<String>,
    json: bool,
) -> Result<()> {
    let categories = store.categories();
    let node = match category {
        Some(c) => NodeRef::Category(resolve_category(categories, c)?),
        None => NodeRef::Root,
    };
    let selection = Selection::new(node, categories);

    let mut filter = EntryFilter::default();
    for name in hide {
        filter.hide(parse_status(name)?);
    }
    filter.text = text.unwrap_or_default();

    let entries = visible_entries(store.entries(), &selection, &filter);
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("No entries");
    }
    for entry in entries {
        print_entry_line(entry, categories);
    }
    Ok(())
}

fn category_path(categories: &[Category], category: Option<&CategoryId>) -> String {
    category
        .and_then(|id| label_path(categories, id))
        .unwrap_or_else(|| ROOT_LABEL.to_string())
}

fn print_entry_line(entry: &Entry, categories: &[Category]) {
    let status = entry.status_kind();
    println!(
        "{} {:<10} {:<40} {:<24} {}",
        status.map(|s| s.icon()).unwrap_or("?"),
        entry.id,
        strip_control_chars(&entry.label),
        category_path(categories, entry.category.as_ref()),
        format_relative_time(entry.last_touched(), Utc::now()),
    );
}

fn show(entry: &Entry, categories: &[Category]) {
    let status = entry
        .status_kind()
        .map(|s| s.name().to_string())
        .unwrap_or_else(|| format!("unknown ({})", entry.status));
    println!("{}", strip_control_chars(&entry.label));
    println!("  id:       {}", entry.id);
    println!("  status:   {}", status);
    println!(
        "  category: {}",
        category_path(categories, entry.category.as_ref())
    );
    println!("  created:  {}", entry.created_at.format("%Y-%m-%d %H:%M"));
    if let Some(modified) = entry.modified_at {
        println!("  modified: {}", modified.format("%Y-%m-%d %H:%M"));
    }
    if let Some(text) = entry.text.as_deref().filter(|t| !t.trim().is_empty()) {
        println!();
        println!("{}", text.trim_end());
    }
}

fn print_tree(categories: &[Category]) {
    for row in flatten(&build_tree(categories), &HashSet::new()) {
        match row.node.category_id() {
            Some(id) => println!("{}{}  ({})", "  ".repeat(row.depth), row.label, id),
            None => println!("{}", row.label),
        }
    }
}

// ============================================================================
// Prompts
// ============================================================================

fn read_line(prompt: &str) -> Result<String> {
    eprint!("{}", prompt);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let line = line.trim().to_string();
    if line.is_empty() {
        bail!("No input given");
    }
    Ok(line)
}

/// Read a password without echoing it. Falls back to a plain line read when
/// stdin is not a terminal, so passwords can be piped in.
fn read_password(prompt: &str) -> Result<String> {
    if !io::stdin().is_terminal() {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        return Ok(line.trim_end_matches(['\r', '\n']).to_string());
    }

    eprint!("{}", prompt);
    io::stderr().flush()?;
    enable_raw_mode()?;
    let result = read_masked();
    let _ = disable_raw_mode();
    eprintln!();
    let password = result?;
    if password.is_empty() {
        bail!("No password given");
    }
    Ok(password)
}

fn read_masked() -> Result<String> {
    let mut password = String::new();
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match key.code {
            KeyCode::Enter => return Ok(password),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                bail!("Cancelled")
            }
            KeyCode::Esc => bail!("Cancelled"),
            KeyCode::Backspace => {
                if password.pop().is_some() {
                    eprint!("\u{8} \u{8}");
                }
            }
            KeyCode::Char(c) => {
                password.push(c);
                eprint!("*");
            }
            _ => continue,
        }
        io::stderr().flush()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry(id: &str) -> Entry {
        Entry {
            id: id.to_string(),
            label: id.to_string(),
            text: None,
            status: Status::New.bits(),
            category: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            modified_at: None,
        }
    }

    fn category(id: &str, label: &str) -> Category {
        Category {
            id: id.to_string(),
            label: Some(label.to_string()),
            parent: None,
        }
    }

    #[test]
    fn test_args_parse_list_flags() {
        let args = Args::try_parse_from([
            "apunto", "list", "--hide", "done", "--hide", "waiting", "--json",
        ])
        .unwrap();
        match args.command {
            Some(Command::List { hide, json, .. }) => {
                assert_eq!(hide, vec!["done", "waiting"]);
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_args_without_subcommand_launch_tui() {
        let args = Args::try_parse_from(["apunto"]).unwrap();
        assert!(args.command.is_none());
    }

    #[test]
    fn test_args_category_subcommand() {
        let args =
            Args::try_parse_from(["apunto", "category", "move", "B", "--parent", "Work"]).unwrap();
        assert!(matches!(
            args.command,
            Some(Command::Category {
                command: CategoryCommand::Move { .. }
            })
        ));
    }

    #[test]
    fn test_resolve_entry_by_prefix() {
        let entries = vec![entry("abc123"), entry("abd456")];
        assert_eq!(resolve_entry(&entries, "abc").unwrap().id, "abc123");
        assert!(resolve_entry(&entries, "ab").is_err());
        assert!(resolve_entry(&entries, "zzz").is_err());
        assert!(resolve_entry(&entries, "").is_err());
    }

    #[test]
    fn test_resolve_category_by_label() {
        let categories = vec![category("1", "Work"), category("2", "Home")];
        assert_eq!(resolve_category(&categories, "2").unwrap(), "2");
        assert_eq!(resolve_category(&categories, "work").unwrap(), "1");
        assert!(resolve_category(&categories, "Garden").is_err());

        let dupes = vec![category("1", "Work"), category("2", "work")];
        assert!(resolve_category(&dupes, "WORK").is_err());
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("Urgent").unwrap(), Status::Urgent);
        assert!(parse_status("later").is_err());
    }

    #[tokio::test]
    async fn test_restore_session_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let auth = AuthClient::new(
            reqwest::Client::new(),
            url::Url::parse("http://127.0.0.1:9").unwrap(),
            std::sync::Arc::new(secrecy::SecretString::from("anon".to_string())),
        );
        let restored = restore_session(&auth, &dir.path().join("session.json"))
            .await
            .unwrap();
        assert!(restored.is_none());
    }

    #[tokio::test]
    async fn test_restore_session_refreshes_expired() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh",
                "refresh_token": "r2",
                "expires_in": 3600,
                "user": { "id": "u1", "email": "ana@example.com" }
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let session_file = dir.path().join("session.json");
        let stale = Session {
            access_token: "old".to_string(),
            refresh_token: "r1".to_string(),
            expires_at: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            user_id: Some("u1".to_string()),
            email: Some("ana@example.com".to_string()),
        };
        session::save(&session_file, &stale).unwrap();

        let auth = AuthClient::new(
            reqwest::Client::new(),
            url::Url::parse(&server.uri()).unwrap(),
            std::sync::Arc::new(secrecy::SecretString::from("anon".to_string())),
        );
        let restored = restore_session(&auth, &session_file).await.unwrap().unwrap();
        assert_eq!(restored.access_token, "fresh");

        let on_disk = session::load(&session_file).unwrap().unwrap();
        assert_eq!(on_disk.refresh_token, "r2");
    }

    #[tokio::test]
    async fn test_restore_session_drops_unrefreshable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Invalid Refresh Token"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let session_file = dir.path().join("session.json");
        let stale = Session {
            access_token: "old".to_string(),
            refresh_token: "gone".to_string(),
            expires_at: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            user_id: None,
            email: None,
        };
        session::save(&session_file, &stale).unwrap();

        let auth = AuthClient::new(
            reqwest::Client::new(),
            url::Url::parse(&server.uri()).unwrap(),
            std::sync::Arc::new(secrecy::SecretString::from("anon".to_string())),
        );
        assert!(restore_session(&auth, &session_file).await.unwrap().is_none());
        assert!(!session_file.exists());
    }
}
