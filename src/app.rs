use crate::config::{Config, Connection};
use crate::filter::{visible_entries, EntryFilter, Selection};
use crate::keybindings::KeybindingRegistry;
use crate::model::{Category, CategoryId, Entry, EntryId, Status};
use crate::remote::{AuthClient, AuthError, PostgrestClient, Session};
use crate::store::{Cache, CategoryDeletion};
use crate::theme::{StyleMap, ThemeVariant};
use crate::tree::{build_tree, flatten, would_create_cycle, NodeRef, TreeRow};
use anyhow::Result;
use ratatui::style::Style;
use std::borrow::Cow;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;

/// Maximum scroll offset for the detail view (ratatui u16 limit).
pub const MAX_SCROLL: usize = u16::MAX as usize;

/// How long a status bar message stays visible.
const STATUS_TTL: Duration = Duration::from_secs(3);

// ============================================================================
// View and Focus Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Login,  // No session: sign-in form
    Browse, // Category tree + entry list
    Detail, // Full-screen entry text
}

/// Which panel has focus in Browse view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Categories,
    Entries,
}

// ============================================================================
// Overlays
// ============================================================================

/// Pending confirmation for destructive operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    DeleteEntry { id: EntryId, label: String },
    /// Children and entries move up to the category's parent.
    DeleteCategory { id: CategoryId, label: String },
    SignOut,
}

impl ConfirmAction {
    pub fn question(&self) -> String {
        match self {
            Self::DeleteEntry { label, .. } => format!("Delete entry \"{}\"?", label),
            Self::DeleteCategory { label, .. } => format!(
                "Delete category \"{}\"? Its subcategories and entries move up one level.",
                label
            ),
            Self::SignOut => "Sign out?".to_string(),
        }
    }
}

/// What a text prompt submits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptKind {
    AddEntry { category: Option<CategoryId> },
    AddCategory { parent: Option<CategoryId> },
    RenameEntry { id: EntryId },
    RenameCategory { id: CategoryId },
}

impl PromptKind {
    pub fn title(&self) -> &'static str {
        match self {
            Self::AddEntry { .. } => "New entry",
            Self::AddCategory { .. } => "New category",
            Self::RenameEntry { .. } => "Rename entry",
            Self::RenameCategory { .. } => "Rename category",
        }
    }
}

/// Single-line text input overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub input: String,
}

/// Thing being moved by the category picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveTarget {
    Entry(EntryId),
    Category(CategoryId),
}

/// Overlay listing every category as a move destination.
#[derive(Debug, Clone)]
pub struct CategoryPicker {
    pub target: MoveTarget,
    pub rows: Vec<TreeRow>,
    pub selected: usize,
}

impl CategoryPicker {
    /// Destinations for `target`. A category cannot move into its own subtree,
    /// so those rows are left out.
    pub fn new(target: MoveTarget, categories: &[Category]) -> Self {
        let rows = flatten(&build_tree(categories), &HashSet::new())
            .into_iter()
            .filter(|row| match (&target, &row.node) {
                (MoveTarget::Category(id), NodeRef::Category(dest)) => {
                    !would_create_cycle(categories, id, Some(dest.as_str()))
                }
                _ => true,
            })
            .collect();
        Self {
            target,
            rows,
            selected: 0,
        }
    }

    pub fn destination(&self) -> Option<&NodeRef> {
        self.rows.get(self.selected).map(|row| &row.node)
    }

    pub fn nav_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn nav_down(&mut self) {
        self.selected = (self.selected + 1).min(self.rows.len().saturating_sub(1));
    }
}

// ============================================================================
// Login Form
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginMode {
    #[default]
    SignIn,
    SignUp,
    ResetPassword,
}

impl LoginMode {
    pub fn next(self) -> Self {
        match self {
            Self::SignIn => Self::SignUp,
            Self::SignUp => Self::ResetPassword,
            Self::ResetPassword => Self::SignIn,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::SignIn => "Sign in",
            Self::SignUp => "Create account",
            Self::ResetPassword => "Reset password",
        }
    }

    pub fn needs_password(self) -> bool {
        !matches!(self, Self::ResetPassword)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginField {
    #[default]
    Email,
    Password,
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub field: LoginField,
    pub mode: LoginMode,
    /// Last authentication failure, shown as a name/message panel.
    pub error: Option<AuthError>,
    pub notice: Option<String>,
    pub busy: bool,
}

impl LoginForm {
    fn field_mut(&mut self) -> &mut String {
        match self.field {
            LoginField::Email => &mut self.email,
            LoginField::Password => &mut self.password,
        }
    }

    pub fn push(&mut self, c: char) {
        self.field_mut().push(c);
    }

    pub fn pop(&mut self) {
        self.field_mut().pop();
    }

    pub fn next_field(&mut self) {
        self.field = match (self.field, self.mode.needs_password()) {
            (LoginField::Email, true) => LoginField::Password,
            _ => LoginField::Email,
        };
    }

    pub fn cycle_mode(&mut self) {
        self.mode = self.mode.next();
        if !self.mode.needs_password() {
            self.field = LoginField::Email;
        }
        self.error = None;
        self.notice = None;
    }
}

// ============================================================================
// Background Events
// ============================================================================

/// Results of background tasks, delivered to the event loop.
///
/// Store results carry `Option`/`bool` because the store has already logged
/// the cause of a failure; the UI only reports that it happened.
pub enum AppEvent {
    /// Full reload of both collections. `None` leaves the cache unchanged.
    Loaded(Option<(Vec<Entry>, Vec<Category>)>),
    EntryAdded(Option<Entry>),
    EntryUpdated {
        id: EntryId,
        /// Verb for the status bar, e.g. "Rename".
        action: &'static str,
        result: Option<Entry>,
    },
    EntryDeleted {
        id: EntryId,
        deleted: bool,
    },
    CategoryAdded(Option<Category>),
    CategoryUpdated {
        id: CategoryId,
        action: &'static str,
        result: Option<Category>,
    },
    /// Cascading delete finished (or stopped) and the follow-up reload ran.
    CategoryDeleted {
        label: String,
        outcome: CategoryDeletion,
        reload: Option<(Vec<Entry>, Vec<Category>)>,
    },
    SignedIn(Session),
    /// Background token refresh; the data needs no reload.
    SessionRefreshed(Session),
    /// The stored session could not be refreshed.
    SessionExpired(AuthError),
    SignUpPending,
    ResetMailSent,
    AuthFailed(AuthError),
    SignedOut,
    /// A background task panicked.
    TaskPanicked {
        task: &'static str,
        error: String,
    },
}

// ============================================================================
// Application State
// ============================================================================

pub struct App {
    /// Anonymous client; `backend` is this plus the session's token.
    anon_backend: PostgrestClient,
    pub backend: PostgrestClient,
    pub auth: AuthClient,
    pub session: Option<Session>,
    pub session_path: PathBuf,
    pub refreshing_session: bool,

    // Settings
    pub confirm_delete: bool,
    pub editor: String,
    pub reset_redirect: Option<url::Url>,

    // Theme
    pub theme_variant: ThemeVariant,
    pub theme: StyleMap,
    pub keybindings: KeybindingRegistry,

    // Data
    pub cache: Cache,
    pub selection: Selection,
    pub filter: EntryFilter,
    pub collapsed: HashSet<NodeRef>,
    /// Category panel rows, rebuilt whenever categories or collapse state change.
    tree_rows: Vec<TreeRow>,
    pub loading: bool,

    // UI State
    pub view: View,
    pub focus: Focus,
    pub category_cursor: usize,
    pub selected_entry: usize,
    pub detail_id: Option<EntryId>,
    pub scroll_offset: usize,
    /// Visible detail lines from the last render, for page scrolling.
    pub detail_visible_lines: usize,
    pub filter_editing: bool,

    pub status_message: Option<(Cow<'static, str>, Instant)>,
    pub needs_redraw: bool,

    // Overlays
    pub show_help: bool,
    pub help_scroll_offset: usize,
    pub pending_confirm: Option<ConfirmAction>,
    pub prompt: Option<Prompt>,
    pub picker: Option<CategoryPicker>,
    /// Entry whose text the event loop should open in the editor.
    pub pending_edit: Option<EntryId>,

    pub login: LoginForm,
}

impl App {
    pub fn new(
        config: &Config,
        connection: Connection,
        session_path: PathBuf,
        session: Option<Session>,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(Duration::from_secs(30))
            .build()?;

        let anon_backend = PostgrestClient::new(
            http_client.clone(),
            connection.url.clone(),
            connection.anon_key.clone(),
        );
        let auth = AuthClient::new(http_client, connection.url, connection.anon_key);

        let theme_variant = ThemeVariant::from_str_name(&config.theme).unwrap_or_else(|| {
            tracing::warn!(theme = %config.theme, "Unknown theme, using dark");
            ThemeVariant::Dark
        });

        let mut keybindings = KeybindingRegistry::new();
        for warning in keybindings.apply_overrides(&config.keybindings) {
            tracing::warn!("{}", warning);
        }

        let reset_redirect = config.reset_redirect().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Ignoring reset_redirect_url");
            None
        });

        let mut app = Self {
            backend: anon_backend.clone(),
            anon_backend,
            auth,
            session: None,
            session_path,
            refreshing_session: false,
            confirm_delete: config.confirm_delete,
            editor: config.editor_command(),
            reset_redirect,
            theme_variant,
            theme: StyleMap::from_palette(&theme_variant.palette()),
            keybindings,
            cache: Cache::default(),
            selection: Selection::default(),
            filter: EntryFilter::default(),
            collapsed: HashSet::new(),
            tree_rows: Vec::new(),
            loading: false,
            view: View::Login,
            focus: Focus::Entries,
            category_cursor: 0,
            selected_entry: 0,
            detail_id: None,
            scroll_offset: 0,
            detail_visible_lines: 0,
            filter_editing: false,
            status_message: None,
            needs_redraw: true,
            show_help: false,
            help_scroll_offset: 0,
            pending_confirm: None,
            prompt: None,
            picker: None,
            pending_edit: None,
            login: LoginForm::default(),
        };
        if let Some(session) = session {
            app.begin_session(session);
        }
        app.refresh_derived();
        Ok(app)
    }

    pub fn style(&self, role: &str) -> Style {
        self.theme.resolve(role)
    }

    pub fn set_theme(&mut self, variant: ThemeVariant) {
        self.theme_variant = variant;
        self.theme = StyleMap::from_palette(&variant.palette());
        self.needs_redraw = true;
    }

    /// Returns the name of the new theme for status display.
    pub fn cycle_theme(&mut self) -> &'static str {
        let next = self.theme_variant.next();
        self.set_theme(next);
        next.name()
    }

    // ------------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------------

    /// Attach a session: authenticated requests, browse view.
    pub fn begin_session(&mut self, session: Session) {
        self.backend = self.anon_backend.with_access_token(session.access_secret());
        self.login = LoginForm {
            email: session.email.clone().unwrap_or_default(),
            ..LoginForm::default()
        };
        self.session = Some(session);
        if self.view == View::Login {
            self.view = View::Browse;
        }
    }

    /// Swap in refreshed tokens without touching the view.
    pub fn replace_session(&mut self, session: Session) {
        self.backend = self.anon_backend.with_access_token(session.access_secret());
        self.session = Some(session);
    }

    /// Drop the session and everything loaded with it.
    pub fn end_session(&mut self) {
        self.session = None;
        self.backend = self.anon_backend.clone();
        self.cache = Cache::default();
        self.selection = Selection::default();
        self.filter = EntryFilter::default();
        self.collapsed.clear();
        self.detail_id = None;
        self.pending_confirm = None;
        self.prompt = None;
        self.picker = None;
        self.filter_editing = false;
        self.view = View::Login;
        self.focus = Focus::Entries;
        self.refresh_derived();
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }

    // ------------------------------------------------------------------------
    // Derived state
    // ------------------------------------------------------------------------

    /// Recompute the tree rows and selection closure from the cache and keep
    /// every cursor in range. Called after any cache change.
    pub fn refresh_derived(&mut self) {
        self.selection.recompute(&self.cache.categories);
        self.tree_rows = flatten(&build_tree(&self.cache.categories), &self.collapsed);
        if let Some(idx) = self
            .tree_rows
            .iter()
            .position(|row| &row.node == self.selection.selected())
        {
            self.category_cursor = idx;
        }
        self.clamp_selections();
        self.needs_redraw = true;
    }

    /// Replace the whole cache with a fresh load.
    pub fn apply_snapshot(&mut self, entries: Vec<Entry>, categories: Vec<Category>) {
        self.cache.replace_all(entries, categories);
        self.refresh_derived();
    }

    pub fn tree_rows(&self) -> &[TreeRow] {
        &self.tree_rows
    }

    /// Entries in the selected subtree that pass the status and text filters.
    pub fn visible_entries(&self) -> Vec<&Entry> {
        visible_entries(&self.cache.entries, &self.selection, &self.filter)
    }

    pub fn clamp_selections(&mut self) {
        self.category_cursor = self
            .category_cursor
            .min(self.tree_rows.len().saturating_sub(1));
        let visible = self.visible_entries().len();
        self.selected_entry = self.selected_entry.min(visible.saturating_sub(1));
    }

    pub fn selected_entry(&self) -> Option<&Entry> {
        self.visible_entries().get(self.selected_entry).copied()
    }

    pub fn selected_row(&self) -> Option<&TreeRow> {
        self.tree_rows.get(self.category_cursor)
    }

    /// Category under the cursor in the category panel (`None` for the root).
    pub fn cursor_category(&self) -> Option<&Category> {
        let id = self.selected_row()?.node.category_id()?;
        self.cache.category(id)
    }

    /// Category new entries land in: the selected node, or none at the root.
    pub fn target_category(&self) -> Option<CategoryId> {
        self.selection.selected().category_id().cloned()
    }

    /// Entry the entry-level actions apply to in the current view.
    pub fn action_entry(&self) -> Option<&Entry> {
        match self.view {
            View::Detail => self.detail_entry(),
            _ => self.selected_entry(),
        }
    }

    /// Move the category cursor and select that node.
    pub fn select_row(&mut self, idx: usize) {
        let Some(row) = self.tree_rows.get(idx) else {
            return;
        };
        let node = row.node.clone();
        self.category_cursor = idx;
        if &node != self.selection.selected() {
            self.selection.select(node, &self.cache.categories);
            self.selected_entry = 0;
        }
        self.clamp_selections();
    }

    pub fn toggle_collapse(&mut self, node: NodeRef) {
        if !self.collapsed.remove(&node) {
            self.collapsed.insert(node);
        }
        self.refresh_derived();
    }

    /// Collapse (`collapse == true`) or expand the node under the cursor.
    /// Leaves and nodes already in the requested state are untouched.
    pub fn set_cursor_collapsed(&mut self, collapse: bool) {
        let Some(row) = self.selected_row() else {
            return;
        };
        if row.has_children && self.collapsed.contains(&row.node) != collapse {
            let node = row.node.clone();
            self.toggle_collapse(node);
        }
    }

    pub fn nav_up(&mut self) {
        match self.focus {
            Focus::Categories => {
                if self.category_cursor > 0 {
                    self.select_row(self.category_cursor - 1);
                }
            }
            Focus::Entries => {
                self.selected_entry = self.selected_entry.saturating_sub(1);
            }
        }
    }

    pub fn nav_down(&mut self) {
        match self.focus {
            Focus::Categories => {
                if self.category_cursor + 1 < self.tree_rows.len() {
                    self.select_row(self.category_cursor + 1);
                }
            }
            Focus::Entries => {
                let max_index = self.visible_entries().len().saturating_sub(1);
                self.selected_entry = self.selected_entry.saturating_add(1).min(max_index);
            }
        }
    }

    /// Flip a status in the hidden mask. Returns a status bar message.
    pub fn toggle_hidden(&mut self, status: Status) -> String {
        self.filter.toggle_status(status);
        self.clamp_selections();
        if self.filter.is_hidden(status) {
            format!("Hiding {} entries", status.name())
        } else {
            format!("Showing {} entries", status.name())
        }
    }

    // ------------------------------------------------------------------------
    // Detail view
    // ------------------------------------------------------------------------

    /// Open the selected entry. Returns false when the list is empty.
    pub fn enter_detail(&mut self) -> bool {
        let Some(id) = self.selected_entry().map(|e| e.id.clone()) else {
            return false;
        };
        tracing::debug!(entry_id = %id, "Opening entry");
        self.detail_id = Some(id);
        self.scroll_offset = 0;
        self.view = View::Detail;
        true
    }

    pub fn exit_detail(&mut self) {
        self.detail_id = None;
        self.scroll_offset = 0;
        self.view = View::Browse;
        self.clamp_selections();
    }

    /// The entry shown in the detail view; `None` once it has been deleted.
    pub fn detail_entry(&self) -> Option<&Entry> {
        self.cache.entry(self.detail_id.as_deref()?)
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(lines);
    }

    pub fn clamp_scroll(&mut self, content_lines: usize, visible_lines: usize) {
        let max_scroll = content_lines.saturating_sub(visible_lines);
        self.scroll_offset = self.scroll_offset.min(max_scroll).min(MAX_SCROLL);
    }

    // ------------------------------------------------------------------------
    // Status bar
    // ------------------------------------------------------------------------

    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    /// Returns true if a message was actually cleared.
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed() >= STATUS_TTL {
                self.status_message = None;
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use secrecy::SecretString;
    use std::sync::Arc;
    use tokio::time::{self, Duration};

    pub(crate) fn test_app() -> App {
        let connection = Connection {
            url: url::Url::parse("http://127.0.0.1:9").unwrap(),
            anon_key: Arc::new(SecretString::from("anon".to_string())),
        };
        let session_path = std::env::temp_dir().join("apunto_app_test_session.json");
        App::new(&Config::default(), connection, session_path, None).unwrap()
    }

    pub(crate) fn session() -> Session {
        Session {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
            user_id: Some("u1".to_string()),
            email: Some("ana@example.com".to_string()),
        }
    }

    pub(crate) fn category(id: &str, parent: Option<&str>) -> Category {
        Category {
            id: id.to_string(),
            label: Some(id.to_string()),
            parent: parent.map(str::to_string),
        }
    }

    pub(crate) fn entry(id: &str, label: &str, category: Option<&str>, status: Status) -> Entry {
        Entry {
            id: id.to_string(),
            label: label.to_string(),
            text: None,
            status: status.bits(),
            category: category.map(str::to_string),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
            modified_at: None,
        }
    }

    /// Signed-in app with categories A > B and C, and one entry per node.
    pub(crate) fn loaded_app() -> App {
        let mut app = test_app();
        app.begin_session(session());
        app.apply_snapshot(
            vec![
                entry("1", "Loose", None, Status::New),
                entry("2", "Plan", Some("A"), Status::Urgent),
                entry("3", "Draft", Some("B"), Status::Done),
                entry("4", "Groceries", Some("C"), Status::Waiting),
            ],
            vec![
                category("A", None),
                category("B", Some("A")),
                category("C", None),
            ],
        );
        app
    }

    #[test]
    fn test_starts_on_login_without_session() {
        let app = test_app();
        assert_eq!(app.view, View::Login);
        assert!(!app.is_signed_in());
        assert!(!app.backend.is_authenticated());
    }

    #[test]
    fn test_begin_and_end_session() {
        let mut app = loaded_app();
        assert_eq!(app.view, View::Browse);
        assert!(app.backend.is_authenticated());
        assert_eq!(app.login.email, "ana@example.com");

        app.end_session();
        assert_eq!(app.view, View::Login);
        assert!(!app.backend.is_authenticated());
        assert!(app.cache.entries.is_empty());
        assert!(app.visible_entries().is_empty());
    }

    #[test]
    fn test_root_shows_every_entry() {
        let app = loaded_app();
        assert_eq!(app.visible_entries().len(), 4);
        assert_eq!(app.tree_rows().len(), 4);
        assert_eq!(app.tree_rows()[0].node, NodeRef::Root);
    }

    #[test]
    fn test_category_navigation_selects_subtree() {
        let mut app = loaded_app();
        app.focus = Focus::Categories;

        app.nav_down();
        assert_eq!(app.selection.selected(), &NodeRef::Category("A".to_string()));
        let labels: Vec<&str> = app.visible_entries().iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Plan", "Draft"]);

        app.nav_down();
        assert_eq!(app.visible_entries().len(), 1);
        assert_eq!(app.target_category().as_deref(), Some("B"));

        app.nav_up();
        app.nav_up();
        app.nav_up();
        assert_eq!(app.selection.selected(), &NodeRef::Root);
        assert_eq!(app.target_category(), None);
    }

    #[test]
    fn test_collapse_hides_children_and_keeps_cursor() {
        let mut app = loaded_app();
        app.focus = Focus::Categories;
        app.nav_down();

        app.set_cursor_collapsed(true);
        assert_eq!(app.tree_rows().len(), 3);
        assert_eq!(app.category_cursor, 1);
        // Collapsing does not narrow the selection.
        assert_eq!(app.visible_entries().len(), 2);

        app.set_cursor_collapsed(false);
        assert_eq!(app.tree_rows().len(), 4);
    }

    #[test]
    fn test_deleted_selected_category_falls_back_to_root() {
        let mut app = loaded_app();
        app.focus = Focus::Categories;
        app.select_row(3);
        assert_eq!(app.visible_entries().len(), 1);

        let entries = app.cache.entries.clone();
        app.apply_snapshot(entries, vec![category("A", None), category("B", Some("A"))]);
        assert_eq!(app.selection.selected(), &NodeRef::Root);
        assert_eq!(app.category_cursor, 0);
    }

    #[test]
    fn test_toggle_hidden_clamps_selection() {
        let mut app = loaded_app();
        app.selected_entry = 3;

        let msg = app.toggle_hidden(Status::Waiting);
        assert_eq!(msg, "Hiding waiting entries");
        assert_eq!(app.visible_entries().len(), 3);
        assert_eq!(app.selected_entry, 2);

        assert_eq!(app.toggle_hidden(Status::Waiting), "Showing waiting entries");
        assert_eq!(app.visible_entries().len(), 4);
    }

    #[test]
    fn test_text_filter_narrows_list() {
        let mut app = loaded_app();
        app.filter.text = "PL".to_string();
        let labels: Vec<&str> = app.visible_entries().iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Plan"]);
    }

    #[test]
    fn test_detail_reports_missing_entry() {
        let mut app = loaded_app();
        app.selected_entry = 1;
        assert!(app.enter_detail());
        assert_eq!(app.view, View::Detail);
        assert_eq!(app.detail_entry().map(|e| e.label.as_str()), Some("Plan"));

        app.cache.remove_entry("2");
        assert!(app.detail_entry().is_none());

        app.exit_detail();
        assert_eq!(app.view, View::Browse);
        assert!(app.detail_id.is_none());
    }

    #[test]
    fn test_enter_detail_on_empty_list() {
        let mut app = test_app();
        app.begin_session(session());
        assert!(!app.enter_detail());
        assert_eq!(app.view, View::Browse);
    }

    #[test]
    fn test_picker_excludes_own_subtree() {
        let app = loaded_app();
        let picker = CategoryPicker::new(
            MoveTarget::Category("A".to_string()),
            &app.cache.categories,
        );
        let nodes: Vec<&NodeRef> = picker.rows.iter().map(|r| &r.node).collect();
        assert_eq!(
            nodes,
            vec![&NodeRef::Root, &NodeRef::Category("C".to_string())]
        );

        let picker = CategoryPicker::new(MoveTarget::Entry("1".to_string()), &app.cache.categories);
        assert_eq!(picker.rows.len(), 4);
    }

    #[test]
    fn test_login_form_fields() {
        let mut form = LoginForm::default();
        form.push('a');
        form.next_field();
        form.push('p');
        form.pop();
        form.push('w');
        assert_eq!(form.email, "a");
        assert_eq!(form.password, "w");

        form.cycle_mode();
        form.cycle_mode();
        assert_eq!(form.mode, LoginMode::ResetPassword);
        assert_eq!(form.field, LoginField::Email);
        form.next_field();
        assert_eq!(form.field, LoginField::Email);
    }

    #[test]
    fn test_clamp_scroll() {
        let mut app = test_app();
        app.scroll_offset = 50;
        app.clamp_scroll(30, 10);
        assert_eq!(app.scroll_offset, 20);
        app.clamp_scroll(5, 10);
        assert_eq!(app.scroll_offset, 0);
    }

    #[test]
    fn test_cycle_theme_round_trip() {
        let mut app = test_app();
        assert_eq!(app.theme_variant, ThemeVariant::Dark);
        assert_eq!(app.cycle_theme(), "Light");
        assert_eq!(app.style("status_bar"), ThemeVariant::Light.palette().status_bar);
        assert_eq!(app.cycle_theme(), "Dark");
    }

    #[test]
    fn test_config_overrides_reach_app() {
        let config = Config {
            theme: "light".to_string(),
            confirm_delete: false,
            keybindings: [("quit".to_string(), "Ctrl+q".to_string())].into(),
            ..Config::default()
        };
        let connection = Connection {
            url: url::Url::parse("http://127.0.0.1:9").unwrap(),
            anon_key: Arc::new(SecretString::from("anon".to_string())),
        };
        let app = App::new(&config, connection, PathBuf::from("s.json"), None).unwrap();

        assert_eq!(app.theme_variant, ThemeVariant::Light);
        assert!(!app.confirm_delete);
        assert_eq!(
            app.keybindings.action_for_key(
                crossterm::event::KeyCode::Char('q'),
                crossterm::event::KeyModifiers::CONTROL,
                crate::keybindings::Context::Global,
            ),
            Some(crate::keybindings::Action::Quit)
        );
    }

    #[tokio::test]
    async fn test_status_expires_after_3_seconds() {
        time::pause();
        let mut app = test_app();
        app.set_status("Saved");

        time::advance(Duration::from_millis(2999)).await;
        assert!(!app.clear_expired_status());
        assert!(app.status_message.is_some());

        time::advance(Duration::from_millis(1)).await;
        assert!(app.clear_expired_status());
        assert!(app.status_message.is_none());
    }
}
