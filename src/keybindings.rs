//! Keybinding registry: maps key events to actions, with config overrides.
//!
//! Bindings are looked up per [`Context`] first and fall back to
//! [`Context::Global`], so the same key can mean different things in the
//! category panel, the entry list and the detail view.
use crossterm::event::{KeyCode, KeyModifiers};
use std::collections::HashMap;

// ============================================================================
// Action Enum
// ============================================================================

/// All user-facing actions that can be triggered by keybindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Quit,
    NavDown,
    NavUp,
    CycleFocus,
    Back,
    Select,
    Refresh,
    CycleTheme,
    ShowHelp,
    CollapseCategory,
    ExpandCategory,
    AddEntry,
    AddCategory,
    Rename,
    Move,
    Delete,
    EditText,
    SetNew,
    SetWaiting,
    SetUrgent,
    SetDone,
    ToggleHideNew,
    ToggleHideWaiting,
    ToggleHideUrgent,
    ToggleHideDone,
    EnterFilter,
    ScrollDown,
    ScrollUp,
    PageDown,
    PageUp,
    ExitDetail,
    Logout,
}

impl Action {
    /// Human-readable description for the help screen.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Quit => "Quit",
            Self::NavDown => "Move down",
            Self::NavUp => "Move up",
            Self::CycleFocus => "Switch panel",
            Self::Back => "Back / clear filter",
            Self::Select => "Select category / open entry",
            Self::Refresh => "Reload from server",
            Self::CycleTheme => "Cycle theme",
            Self::ShowHelp => "Show help",
            Self::CollapseCategory => "Collapse category",
            Self::ExpandCategory => "Expand category",
            Self::AddEntry => "New entry",
            Self::AddCategory => "New category",
            Self::Rename => "Rename",
            Self::Move => "Move to category",
            Self::Delete => "Delete",
            Self::EditText => "Edit text in $EDITOR",
            Self::SetNew => "Mark new",
            Self::SetWaiting => "Mark waiting",
            Self::SetUrgent => "Mark urgent",
            Self::SetDone => "Mark done",
            Self::ToggleHideNew => "Show/hide new entries",
            Self::ToggleHideWaiting => "Show/hide waiting entries",
            Self::ToggleHideUrgent => "Show/hide urgent entries",
            Self::ToggleHideDone => "Show/hide done entries",
            Self::EnterFilter => "Filter by label",
            Self::ScrollDown => "Scroll down",
            Self::ScrollUp => "Scroll up",
            Self::PageDown => "Page down",
            Self::PageUp => "Page up",
            Self::ExitDetail => "Back to list",
            Self::Logout => "Sign out",
        }
    }

    /// Config name, as used in the `[keybindings]` table.
    pub fn config_name(self) -> &'static str {
        match self {
            Self::Quit => "quit",
            Self::NavDown => "nav_down",
            Self::NavUp => "nav_up",
            Self::CycleFocus => "cycle_focus",
            Self::Back => "back",
            Self::Select => "select",
            Self::Refresh => "refresh",
            Self::CycleTheme => "cycle_theme",
            Self::ShowHelp => "show_help",
            Self::CollapseCategory => "collapse_category",
            Self::ExpandCategory => "expand_category",
            Self::AddEntry => "add_entry",
            Self::AddCategory => "add_category",
            Self::Rename => "rename",
            Self::Move => "move",
            Self::Delete => "delete",
            Self::EditText => "edit_text",
            Self::SetNew => "set_new",
            Self::SetWaiting => "set_waiting",
            Self::SetUrgent => "set_urgent",
            Self::SetDone => "set_done",
            Self::ToggleHideNew => "toggle_hide_new",
            Self::ToggleHideWaiting => "toggle_hide_waiting",
            Self::ToggleHideUrgent => "toggle_hide_urgent",
            Self::ToggleHideDone => "toggle_hide_done",
            Self::EnterFilter => "filter",
            Self::ScrollDown => "scroll_down",
            Self::ScrollUp => "scroll_up",
            Self::PageDown => "page_down",
            Self::PageUp => "page_up",
            Self::ExitDetail => "exit_detail",
            Self::Logout => "logout",
        }
    }

    const ALL: [Action; 32] = [
        Self::Quit,
        Self::NavDown,
        Self::NavUp,
        Self::CycleFocus,
        Self::Back,
        Self::Select,
        Self::Refresh,
        Self::CycleTheme,
        Self::ShowHelp,
        Self::CollapseCategory,
        Self::ExpandCategory,
        Self::AddEntry,
        Self::AddCategory,
        Self::Rename,
        Self::Move,
        Self::Delete,
        Self::EditText,
        Self::SetNew,
        Self::SetWaiting,
        Self::SetUrgent,
        Self::SetDone,
        Self::ToggleHideNew,
        Self::ToggleHideWaiting,
        Self::ToggleHideUrgent,
        Self::ToggleHideDone,
        Self::EnterFilter,
        Self::ScrollDown,
        Self::ScrollUp,
        Self::PageDown,
        Self::PageUp,
        Self::ExitDetail,
        Self::Logout,
    ];
}

/// Parse an action name from config. Dashes and underscores are equivalent.
fn parse_action_name(name: &str) -> Option<Action> {
    let name = name.trim().to_ascii_lowercase().replace('-', "_");
    Action::ALL.into_iter().find(|a| a.config_name() == name)
}

// ============================================================================
// Context Enum
// ============================================================================

/// Dispatch context, determines which bindings are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    Global,
    Categories,
    Entries,
    Detail,
}

impl Context {
    pub fn title(self) -> &'static str {
        match self {
            Self::Global => "Everywhere",
            Self::Categories => "Category panel",
            Self::Entries => "Entry list",
            Self::Detail => "Entry detail",
        }
    }
}

// ============================================================================
// Key Specification
// ============================================================================

/// A key event: code + modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeySpec {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeySpec {
    pub const fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    pub const fn plain(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::NONE)
    }

    pub const fn char(c: char) -> Self {
        Self::plain(KeyCode::Char(c))
    }

    pub const fn ctrl(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    /// Terminals report `Shift` alongside upper-case characters; the
    /// character already carries it.
    fn normalized(code: KeyCode, modifiers: KeyModifiers) -> Self {
        match code {
            KeyCode::Char(_) => Self::new(code, modifiers.difference(KeyModifiers::SHIFT)),
            _ => Self::new(code, modifiers),
        }
    }
}

/// Parse a key string from config.
///
/// Accepts single characters ("q", "/"), named keys ("Enter", "Esc",
/// "Tab", "Up", "Space", ...), `Ctrl+<char>` and `F1`..`F12`.
fn parse_key_string(s: &str) -> Option<KeySpec> {
    let s = s.trim();

    if let Some(rest) = s.strip_prefix("Ctrl+").or_else(|| s.strip_prefix("ctrl+")) {
        let mut chars = rest.trim().chars();
        let c = chars.next()?;
        return chars.next().is_none().then(|| KeySpec::ctrl(c));
    }

    let named = match s.to_ascii_lowercase().as_str() {
        "enter" | "return" => Some(KeyCode::Enter),
        "esc" | "escape" => Some(KeyCode::Esc),
        "tab" => Some(KeyCode::Tab),
        "up" => Some(KeyCode::Up),
        "down" => Some(KeyCode::Down),
        "left" => Some(KeyCode::Left),
        "right" => Some(KeyCode::Right),
        "backspace" => Some(KeyCode::Backspace),
        "delete" | "del" => Some(KeyCode::Delete),
        "space" => Some(KeyCode::Char(' ')),
        _ => None,
    };
    if let Some(code) = named {
        return Some(KeySpec::plain(code));
    }

    if let Some(n) = s
        .strip_prefix(['F', 'f'])
        .and_then(|n| n.parse::<u8>().ok())
    {
        return (1..=12).contains(&n).then(|| KeySpec::plain(KeyCode::F(n)));
    }

    let mut chars = s.chars();
    let c = chars.next()?;
    chars.next().is_none().then(|| KeySpec::char(c))
}

/// Format a KeySpec for the help screen.
fn format_key(key: &KeySpec) -> String {
    let name = match key.code {
        KeyCode::Char(' ') => "Space".to_string(),
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::Up => "Up".to_string(),
        KeyCode::Down => "Down".to_string(),
        KeyCode::Left => "Left".to_string(),
        KeyCode::Right => "Right".to_string(),
        KeyCode::Backspace => "Backspace".to_string(),
        KeyCode::Delete => "Del".to_string(),
        KeyCode::F(n) => format!("F{}", n),
        _ => "?".to_string(),
    };

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        format!("Ctrl+{}", name)
    } else {
        name
    }
}

// ============================================================================
// Defaults
// ============================================================================

const DEFAULT_BINDINGS: &[(Context, KeySpec, Action)] = &[
    // Everywhere in the browse view
    (Context::Global, KeySpec::char('q'), Action::Quit),
    (Context::Global, KeySpec::char('j'), Action::NavDown),
    (Context::Global, KeySpec::plain(KeyCode::Down), Action::NavDown),
    (Context::Global, KeySpec::char('k'), Action::NavUp),
    (Context::Global, KeySpec::plain(KeyCode::Up), Action::NavUp),
    (Context::Global, KeySpec::plain(KeyCode::Tab), Action::CycleFocus),
    (Context::Global, KeySpec::plain(KeyCode::Esc), Action::Back),
    (Context::Global, KeySpec::plain(KeyCode::Enter), Action::Select),
    (Context::Global, KeySpec::ctrl('r'), Action::Refresh),
    (Context::Global, KeySpec::char('T'), Action::CycleTheme),
    (Context::Global, KeySpec::char('?'), Action::ShowHelp),
    (Context::Global, KeySpec::char('a'), Action::AddEntry),
    (Context::Global, KeySpec::char('A'), Action::AddCategory),
    (Context::Global, KeySpec::char('r'), Action::Rename),
    (Context::Global, KeySpec::char('m'), Action::Move),
    (Context::Global, KeySpec::char('d'), Action::Delete),
    (Context::Global, KeySpec::char('/'), Action::EnterFilter),
    (Context::Global, KeySpec::char('N'), Action::ToggleHideNew),
    (Context::Global, KeySpec::char('W'), Action::ToggleHideWaiting),
    (Context::Global, KeySpec::char('U'), Action::ToggleHideUrgent),
    (Context::Global, KeySpec::char('X'), Action::ToggleHideDone),
    (Context::Global, KeySpec::char('L'), Action::Logout),
    // Category panel
    (Context::Categories, KeySpec::char('h'), Action::CollapseCategory),
    (Context::Categories, KeySpec::plain(KeyCode::Left), Action::CollapseCategory),
    (Context::Categories, KeySpec::char('l'), Action::ExpandCategory),
    (Context::Categories, KeySpec::plain(KeyCode::Right), Action::ExpandCategory),
    (Context::Categories, KeySpec::char('a'), Action::AddCategory),
    // Entry list
    (Context::Entries, KeySpec::char('e'), Action::EditText),
    (Context::Entries, KeySpec::char('1'), Action::SetNew),
    (Context::Entries, KeySpec::char('2'), Action::SetWaiting),
    (Context::Entries, KeySpec::char('3'), Action::SetUrgent),
    (Context::Entries, KeySpec::char('4'), Action::SetDone),
    // Detail view
    (Context::Detail, KeySpec::char('q'), Action::Quit),
    (Context::Detail, KeySpec::plain(KeyCode::Esc), Action::ExitDetail),
    (Context::Detail, KeySpec::char('b'), Action::ExitDetail),
    (Context::Detail, KeySpec::char('j'), Action::ScrollDown),
    (Context::Detail, KeySpec::plain(KeyCode::Down), Action::ScrollDown),
    (Context::Detail, KeySpec::char('k'), Action::ScrollUp),
    (Context::Detail, KeySpec::plain(KeyCode::Up), Action::ScrollUp),
    (Context::Detail, KeySpec::ctrl('d'), Action::PageDown),
    (Context::Detail, KeySpec::ctrl('u'), Action::PageUp),
    (Context::Detail, KeySpec::char('e'), Action::EditText),
    (Context::Detail, KeySpec::char('r'), Action::Rename),
    (Context::Detail, KeySpec::char('m'), Action::Move),
    (Context::Detail, KeySpec::char('d'), Action::Delete),
    (Context::Detail, KeySpec::char('1'), Action::SetNew),
    (Context::Detail, KeySpec::char('2'), Action::SetWaiting),
    (Context::Detail, KeySpec::char('3'), Action::SetUrgent),
    (Context::Detail, KeySpec::char('4'), Action::SetDone),
    (Context::Detail, KeySpec::char('T'), Action::CycleTheme),
    (Context::Detail, KeySpec::char('?'), Action::ShowHelp),
];

// ============================================================================
// Keybinding Registry
// ============================================================================

/// Context-aware key to action lookup.
pub struct KeybindingRegistry {
    lookup: HashMap<(Context, KeySpec), Action>,
    /// Registration order, for the help screen.
    bindings: Vec<(Context, KeySpec, Action)>,
}

impl KeybindingRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            lookup: HashMap::new(),
            bindings: Vec::with_capacity(DEFAULT_BINDINGS.len()),
        };
        for &(context, key, action) in DEFAULT_BINDINGS {
            registry.bind(context, key, action);
        }
        registry
    }

    fn bind(&mut self, context: Context, key: KeySpec, action: Action) {
        self.lookup.insert((context, key), action);
        self.bindings.push((context, key, action));
    }

    /// Apply user overrides from the config `[keybindings]` table.
    ///
    /// Keys are action names ("quit", "add_entry"), values are key strings
    /// ("q", "Ctrl+d", "F5"). An overridden action keeps the contexts it was
    /// bound in. Returns warnings for unknown actions and unparseable keys.
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, String>) -> Vec<String> {
        let mut warnings = Vec::new();

        for (action_name, key_str) in overrides {
            let Some(action) = parse_action_name(action_name) else {
                warnings.push(format!("Unknown action '{}', ignoring", action_name));
                continue;
            };
            let Some(key) = parse_key_string(key_str) else {
                warnings.push(format!(
                    "Cannot parse key '{}' for action '{}', ignoring",
                    key_str, action_name
                ));
                continue;
            };

            let mut contexts: Vec<Context> = Vec::new();
            for (context, _, _) in self.bindings.iter().filter(|(_, _, a)| *a == action) {
                if !contexts.contains(context) {
                    contexts.push(*context);
                }
            }

            self.lookup.retain(|_, a| *a != action);
            self.bindings.retain(|(_, _, a)| *a != action);
            for context in contexts {
                self.bind(context, key, action);
            }

            tracing::info!(action = %action_name, key = %key_str, "Applied keybinding override");
        }

        warnings
    }

    /// Look up the action for a key, trying `context` before Global.
    pub fn action_for_key(
        &self,
        code: KeyCode,
        modifiers: KeyModifiers,
        context: Context,
    ) -> Option<Action> {
        let key = KeySpec::normalized(code, modifiers);
        self.lookup
            .get(&(context, key))
            .or_else(|| self.lookup.get(&(Context::Global, key)))
            .copied()
    }

    /// (context, key label, description) for every binding, in registration order.
    pub fn all_bindings(&self) -> Vec<(Context, String, &'static str)> {
        self.bindings
            .iter()
            .map(|(ctx, key, action)| (*ctx, format_key(key), action.describe()))
            .collect()
    }
}

impl Default for KeybindingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(reg: &KeybindingRegistry, c: char, context: Context) -> Option<Action> {
        reg.action_for_key(KeyCode::Char(c), KeyModifiers::NONE, context)
    }

    #[test]
    fn test_global_keys_reach_every_panel() {
        let reg = KeybindingRegistry::new();
        assert_eq!(lookup(&reg, 'q', Context::Categories), Some(Action::Quit));
        assert_eq!(lookup(&reg, 'j', Context::Entries), Some(Action::NavDown));
        assert_eq!(
            reg.action_for_key(KeyCode::Up, KeyModifiers::NONE, Context::Categories),
            Some(Action::NavUp)
        );
    }

    #[test]
    fn test_context_overrides_global() {
        let reg = KeybindingRegistry::new();
        assert_eq!(lookup(&reg, 'a', Context::Entries), Some(Action::AddEntry));
        assert_eq!(lookup(&reg, 'a', Context::Categories), Some(Action::AddCategory));
        assert_eq!(lookup(&reg, 'j', Context::Detail), Some(Action::ScrollDown));
        assert_eq!(
            reg.action_for_key(KeyCode::Esc, KeyModifiers::NONE, Context::Detail),
            Some(Action::ExitDetail)
        );
    }

    #[test]
    fn test_status_keys_only_on_entries() {
        let reg = KeybindingRegistry::new();
        assert_eq!(lookup(&reg, '4', Context::Entries), Some(Action::SetDone));
        assert_eq!(lookup(&reg, '4', Context::Detail), Some(Action::SetDone));
        assert_eq!(lookup(&reg, '4', Context::Categories), None);
    }

    #[test]
    fn test_shift_is_folded_into_char() {
        let reg = KeybindingRegistry::new();
        assert_eq!(
            reg.action_for_key(KeyCode::Char('X'), KeyModifiers::SHIFT, Context::Entries),
            Some(Action::ToggleHideDone)
        );
    }

    #[test]
    fn test_ctrl_modifiers() {
        let reg = KeybindingRegistry::new();
        assert_eq!(
            reg.action_for_key(KeyCode::Char('d'), KeyModifiers::CONTROL, Context::Detail),
            Some(Action::PageDown)
        );
        assert_eq!(
            reg.action_for_key(KeyCode::Char('r'), KeyModifiers::CONTROL, Context::Entries),
            Some(Action::Refresh)
        );
        assert_eq!(lookup(&reg, 'r', Context::Entries), Some(Action::Rename));
    }

    #[test]
    fn test_unknown_key_returns_none() {
        let reg = KeybindingRegistry::new();
        assert_eq!(
            reg.action_for_key(KeyCode::F(12), KeyModifiers::NONE, Context::Global),
            None
        );
    }

    #[test]
    fn test_override_moves_binding_in_every_context() {
        let mut reg = KeybindingRegistry::new();
        let overrides = HashMap::from([("set-done".to_string(), "x".to_string())]);

        let warnings = reg.apply_overrides(&overrides);
        assert!(warnings.is_empty());

        assert_eq!(lookup(&reg, 'x', Context::Entries), Some(Action::SetDone));
        assert_eq!(lookup(&reg, 'x', Context::Detail), Some(Action::SetDone));
        assert_eq!(lookup(&reg, '4', Context::Entries), None);
        assert_eq!(lookup(&reg, 'x', Context::Categories), None);
    }

    #[test]
    fn test_override_warnings() {
        let mut reg = KeybindingRegistry::new();
        let overrides = HashMap::from([
            ("teleport".to_string(), "t".to_string()),
            ("quit".to_string(), "Ctrl+Alt+Q".to_string()),
        ]);

        let mut warnings = reg.apply_overrides(&overrides);
        warnings.sort();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("Cannot parse key"));
        assert!(warnings[1].contains("Unknown action"));
        assert_eq!(lookup(&reg, 'q', Context::Global), Some(Action::Quit));
    }

    #[test]
    fn test_parse_key_string() {
        assert_eq!(parse_key_string("Enter"), Some(KeySpec::plain(KeyCode::Enter)));
        assert_eq!(parse_key_string("space"), Some(KeySpec::char(' ')));
        assert_eq!(parse_key_string("Ctrl+d"), Some(KeySpec::ctrl('d')));
        assert_eq!(parse_key_string("F12"), Some(KeySpec::plain(KeyCode::F(12))));
        assert_eq!(parse_key_string("F13"), None);
        assert_eq!(parse_key_string("/"), Some(KeySpec::char('/')));
        assert_eq!(parse_key_string("ab"), None);
    }

    #[test]
    fn test_every_action_name_round_trips() {
        for action in Action::ALL {
            assert_eq!(parse_action_name(action.config_name()), Some(action));
        }
    }

    #[test]
    fn test_format_key_display() {
        assert_eq!(format_key(&KeySpec::char('q')), "q");
        assert_eq!(format_key(&KeySpec::ctrl('d')), "Ctrl+d");
        assert_eq!(format_key(&KeySpec::char(' ')), "Space");
        assert_eq!(format_key(&KeySpec::plain(KeyCode::F(5))), "F5");
    }
}
