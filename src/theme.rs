//! Dark and light palettes for the TUI.
//!
//! Widgets never name colors directly; they ask [`StyleMap::resolve`] for a
//! semantic role such as `"entry_selected"` and the active [`ThemeVariant`]
//! decides what that looks like.

use crate::model::Status;
use ratatui::style::{Color, Modifier, Style};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeVariant {
    #[default]
    Dark,
    Light,
}

impl ThemeVariant {
    /// Case-insensitive lookup used for the `theme` config key.
    pub fn from_str_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dark" => Some(Self::Dark),
            "light" => Some(Self::Light),
            _ => None,
        }
    }

    pub fn palette(self) -> ColorPalette {
        match self {
            Self::Dark => ColorPalette::dark(),
            Self::Light => ColorPalette::light(),
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Dark => "Dark",
            Self::Light => "Light",
        }
    }
}

/// Every semantic role the widgets draw with.
#[derive(Debug, Clone)]
pub struct ColorPalette {
    // Category panel
    pub category_normal: Style,
    pub category_selected: Style,
    pub category_root: Style,

    // Entry list
    pub entry_label: Style,
    pub entry_done: Style,
    pub entry_selected: Style,
    pub entry_date: Style,
    pub entry_category: Style,
    pub status_new: Style,
    pub status_waiting: Style,
    pub status_urgent: Style,
    pub status_done: Style,

    // Detail view
    pub detail_heading: Style,
    pub detail_body: Style,
    pub detail_metadata: Style,
    pub detail_code_block: Style,
    pub detail_inline_code: Style,
    pub detail_emphasis: Style,
    pub detail_strong: Style,
    pub detail_link: Style,
    pub detail_missing: Style,

    // Login view
    pub login_field: Style,
    pub login_field_focused: Style,
    pub login_error: Style,

    // Chrome
    pub status_bar: Style,
    pub filter_bar: Style,
    pub panel_border: Style,
    pub panel_border_focused: Style,
    pub overlay_border: Style,
}

impl ColorPalette {
    fn dark() -> Self {
        let selected = Style::default().bg(Color::DarkGray).fg(Color::White);
        Self {
            category_normal: Style::default(),
            category_selected: selected,
            category_root: Style::default().add_modifier(Modifier::BOLD),

            entry_label: Style::default(),
            entry_done: Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::CROSSED_OUT),
            entry_selected: selected,
            entry_date: Style::default().fg(Color::DarkGray),
            entry_category: Style::default().fg(Color::Cyan),
            status_new: Style::default().fg(Color::Green),
            status_waiting: Style::default().fg(Color::Yellow),
            status_urgent: Style::default()
                .fg(Color::Red)
                .add_modifier(Modifier::BOLD),
            status_done: Style::default().fg(Color::DarkGray),

            detail_heading: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            detail_body: Style::default(),
            detail_metadata: Style::default().fg(Color::DarkGray),
            detail_code_block: Style::default().fg(Color::Yellow).bg(Color::Black),
            detail_inline_code: Style::default().fg(Color::Yellow),
            detail_emphasis: Style::default().add_modifier(Modifier::ITALIC),
            detail_strong: Style::default().add_modifier(Modifier::BOLD),
            detail_link: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::UNDERLINED),
            detail_missing: Style::default().fg(Color::Red),

            login_field: Style::default(),
            login_field_focused: Style::default().fg(Color::Cyan),
            login_error: Style::default().fg(Color::Red),

            status_bar: selected,
            filter_bar: Style::default().fg(Color::Yellow),
            panel_border: Style::default(),
            panel_border_focused: Style::default().fg(Color::Cyan),
            overlay_border: Style::default().fg(Color::Yellow),
        }
    }

    fn light() -> Self {
        let selected = Style::default().bg(Color::Blue).fg(Color::White);
        Self {
            category_normal: Style::default().fg(Color::Black),
            category_selected: selected,
            category_root: Style::default()
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),

            entry_label: Style::default().fg(Color::Black),
            entry_done: Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::CROSSED_OUT),
            entry_selected: selected,
            entry_date: Style::default().fg(Color::DarkGray),
            entry_category: Style::default().fg(Color::Blue),
            status_new: Style::default().fg(Color::Green),
            status_waiting: Style::default().fg(Color::Magenta),
            status_urgent: Style::default()
                .fg(Color::Red)
                .add_modifier(Modifier::BOLD),
            status_done: Style::default().fg(Color::Gray),

            detail_heading: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::BOLD),
            detail_body: Style::default().fg(Color::Black),
            detail_metadata: Style::default().fg(Color::DarkGray),
            detail_code_block: Style::default().fg(Color::DarkGray).bg(Color::White),
            detail_inline_code: Style::default().fg(Color::DarkGray),
            detail_emphasis: Style::default().add_modifier(Modifier::ITALIC),
            detail_strong: Style::default().add_modifier(Modifier::BOLD),
            detail_link: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::UNDERLINED),
            detail_missing: Style::default().fg(Color::Red),

            login_field: Style::default().fg(Color::Black),
            login_field_focused: Style::default().fg(Color::Blue),
            login_error: Style::default().fg(Color::Red),

            status_bar: Style::default().bg(Color::White).fg(Color::Black),
            filter_bar: Style::default().fg(Color::Magenta),
            panel_border: Style::default().fg(Color::DarkGray),
            panel_border_focused: Style::default().fg(Color::Blue),
            overlay_border: Style::default().fg(Color::Magenta),
        }
    }
}

/// Role name to style, rebuilt whenever the theme changes.
#[derive(Debug, Clone)]
pub struct StyleMap {
    map: HashMap<&'static str, Style>,
}

impl StyleMap {
    pub fn from_palette(p: &ColorPalette) -> Self {
        let roles = [
            ("category_normal", p.category_normal),
            ("category_selected", p.category_selected),
            ("category_root", p.category_root),
            ("entry_label", p.entry_label),
            ("entry_done", p.entry_done),
            ("entry_selected", p.entry_selected),
            ("entry_date", p.entry_date),
            ("entry_category", p.entry_category),
            ("status_new", p.status_new),
            ("status_waiting", p.status_waiting),
            ("status_urgent", p.status_urgent),
            ("status_done", p.status_done),
            ("detail_heading", p.detail_heading),
            ("detail_body", p.detail_body),
            ("detail_metadata", p.detail_metadata),
            ("detail_code_block", p.detail_code_block),
            ("detail_inline_code", p.detail_inline_code),
            ("detail_emphasis", p.detail_emphasis),
            ("detail_strong", p.detail_strong),
            ("detail_link", p.detail_link),
            ("detail_missing", p.detail_missing),
            ("login_field", p.login_field),
            ("login_field_focused", p.login_field_focused),
            ("login_error", p.login_error),
            ("status_bar", p.status_bar),
            ("filter_bar", p.filter_bar),
            ("panel_border", p.panel_border),
            ("panel_border_focused", p.panel_border_focused),
            ("overlay_border", p.overlay_border),
        ];
        Self {
            map: roles.into_iter().collect(),
        }
    }

    /// Unknown roles resolve to the terminal default.
    pub fn resolve(&self, role: &str) -> Style {
        self.map.get(role).copied().unwrap_or_default()
    }
}

/// Role used to draw a status icon.
pub fn status_role(status: Option<Status>) -> &'static str {
    match status {
        Some(Status::New) | None => "status_new",
        Some(Status::Waiting) => "status_waiting",
        Some(Status::Urgent) => "status_urgent",
        Some(Status::Done) => "status_done",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dark_selection_is_gray_on_white() {
        let palette = ThemeVariant::Dark.palette();
        assert_eq!(
            palette.entry_selected,
            Style::default().bg(Color::DarkGray).fg(Color::White)
        );
        assert_eq!(palette.category_selected, palette.entry_selected);
    }

    #[test]
    fn light_palette_differs_from_dark() {
        let dark = ThemeVariant::Dark.palette();
        let light = ThemeVariant::Light.palette();
        assert_ne!(dark.entry_selected, light.entry_selected);
        assert_ne!(dark.status_bar, light.status_bar);
    }

    #[test]
    fn variant_from_str_name() {
        assert_eq!(ThemeVariant::from_str_name("dark"), Some(ThemeVariant::Dark));
        assert_eq!(ThemeVariant::from_str_name("Light"), Some(ThemeVariant::Light));
        assert_eq!(ThemeVariant::from_str_name("solarized"), None);
    }

    #[test]
    fn variant_cycles() {
        assert_eq!(ThemeVariant::Dark.next(), ThemeVariant::Light);
        assert_eq!(ThemeVariant::Light.next(), ThemeVariant::Dark);
    }

    #[test]
    fn style_map_resolves_roles() {
        let palette = ThemeVariant::Dark.palette();
        let sm = StyleMap::from_palette(&palette);

        assert_eq!(sm.resolve("detail_heading"), palette.detail_heading);
        assert_eq!(sm.resolve("login_error"), palette.login_error);
        assert_eq!(sm.resolve("no_such_role"), Style::default());
    }

    #[test]
    fn every_status_has_a_role() {
        let sm = StyleMap::from_palette(&ThemeVariant::Light.palette());
        for status in Status::ALL {
            let role = status_role(Some(status));
            assert!(sm.map.contains_key(role), "missing {}", role);
        }
    }
}
