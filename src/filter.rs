//! Selection and filter state for the entry list.
//!
//! The visible entry list is a pure function of three inputs: the entries,
//! the selected category subtree, and the status/text filter. Nothing here
//! touches the network.

use crate::model::{Category, Entry, Status};
use crate::tree::{selection_closure, NodeRef};
use std::collections::HashSet;

// ============================================================================
// Status / text filter
// ============================================================================

/// Status bitmask and label filter applied to the entry list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    /// Statuses to hide, as a bitmask of [`Status`] bits.
    pub hidden: i32,
    /// Case-insensitive label substring.
    pub text: String,
}

impl EntryFilter {
    /// Flip one status between shown and hidden.
    pub fn toggle_status(&mut self, status: Status) {
        self.hidden ^= status.bits();
    }

    pub fn hide(&mut self, status: Status) {
        self.hidden |= status.bits();
    }

    pub fn is_hidden(&self, status: Status) -> bool {
        self.hidden & status.bits() != 0
    }

    /// An entry is hidden when any of its status bits is in the mask.
    pub fn hides(&self, entry: &Entry) -> bool {
        entry.status & self.hidden != 0
    }

    /// Label match. Entries without a label never match, even with an empty filter.
    pub fn matches_text(&self, entry: &Entry) -> bool {
        if entry.label.is_empty() {
            return false;
        }
        if self.text.is_empty() {
            return true;
        }
        entry
            .label
            .to_lowercase()
            .contains(&self.text.to_lowercase())
    }

    pub fn accepts(&self, entry: &Entry) -> bool {
        !self.hides(entry) && self.matches_text(entry)
    }
}

// ============================================================================
// Category selection
// ============================================================================

/// The selected tree node together with its descendant closure.
///
/// Must be recomputed via [`Selection::recompute`] whenever the category list
/// changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    selected: NodeRef,
    closure: Vec<NodeRef>,
    members: HashSet<NodeRef>,
}

impl Default for Selection {
    fn default() -> Self {
        Self::new(NodeRef::Root, &[])
    }
}

impl Selection {
    pub fn new(selected: NodeRef, categories: &[Category]) -> Self {
        let closure = selection_closure(&selected, categories);
        let members = closure.iter().cloned().collect();
        Self {
            selected,
            closure,
            members,
        }
    }

    pub fn selected(&self) -> &NodeRef {
        &self.selected
    }

    /// Selected node first, then its descendants in pre-order.
    pub fn closure(&self) -> &[NodeRef] {
        &self.closure
    }

    pub fn select(&mut self, node: NodeRef, categories: &[Category]) {
        *self = Self::new(node, categories);
    }

    /// Rebuild the closure after the category list changed. A selected
    /// category that no longer exists falls back to the root.
    pub fn recompute(&mut self, categories: &[Category]) {
        let selected = match &self.selected {
            NodeRef::Category(id) if !categories.iter().any(|c| &c.id == id) => NodeRef::Root,
            other => other.clone(),
        };
        *self = Self::new(selected, categories);
    }

    pub fn contains(&self, node: &NodeRef) -> bool {
        self.members.contains(node)
    }

    /// Whether an entry falls inside the selected subtree. Entries without a
    /// category belong to the root.
    pub fn contains_entry(&self, entry: &Entry) -> bool {
        self.contains(&NodeRef::for_entry(entry.category.as_ref()))
    }
}

/// Entries inside the selection that pass the filter, in input order.
pub fn visible_entries<'a>(
    entries: &'a [Entry],
    selection: &Selection,
    filter: &EntryFilter,
) -> Vec<&'a Entry> {
    entries
        .iter()
        .filter(|e| selection.contains_entry(e) && filter.accepts(e))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn entry(id: &str, label: &str, status: i32, category: Option<&str>) -> Entry {
        Entry {
            id: id.to_string(),
            label: label.to_string(),
            text: None,
            status,
            category: category.map(str::to_string),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            modified_at: None,
        }
    }

    fn cat(id: &str, parent: Option<&str>) -> Category {
        Category {
            id: id.to_string(),
            label: Some(id.to_string()),
            parent: parent.map(str::to_string),
        }
    }

    fn ids(entries: Vec<&Entry>) -> Vec<&str> {
        entries.into_iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_root_shows_uncategorized_and_categorized() {
        let entries = vec![entry("1", "one", 1, None), entry("2", "two", 1, Some("A"))];
        let categories = vec![cat("A", None)];
        let selection = Selection::new(NodeRef::Root, &categories);

        let visible = visible_entries(&entries, &selection, &EntryFilter::default());
        assert_eq!(ids(visible), vec!["1", "2"]);
    }

    #[test]
    fn test_category_selection_includes_descendants_only() {
        let entries = vec![
            entry("1", "loose", 1, None),
            entry("2", "in a", 1, Some("A")),
            entry("3", "in b", 1, Some("B")),
            entry("4", "in c", 1, Some("C")),
        ];
        let categories = vec![cat("A", None), cat("B", Some("A")), cat("C", None)];
        let selection = Selection::new(NodeRef::Category("A".into()), &categories);

        let visible = visible_entries(&entries, &selection, &EntryFilter::default());
        assert_eq!(ids(visible), vec!["2", "3"]);
    }

    #[test]
    fn test_status_mask_hides_matching_bits() {
        let entries = vec![
            entry("1", "a", Status::New.bits(), None),
            entry("2", "b", Status::Done.bits(), None),
            entry("3", "c", Status::Urgent.bits(), None),
        ];
        let mut filter = EntryFilter::default();
        filter.toggle_status(Status::Done);
        assert!(filter.is_hidden(Status::Done));

        let visible = visible_entries(&entries, &Selection::default(), &filter);
        assert_eq!(ids(visible), vec!["1", "3"]);

        filter.toggle_status(Status::Done);
        assert_eq!(filter.hidden, 0);
    }

    #[test]
    fn test_unknown_bits_still_filter() {
        let odd = entry("1", "combined", 0b1001, None);
        let mut filter = EntryFilter::default();
        filter.hide(Status::Done);
        assert!(filter.hides(&odd));
    }

    #[test]
    fn test_text_filter_is_case_insensitive() {
        let entries = vec![
            entry("1", "Buy Milk", 1, None),
            entry("2", "call plumber", 1, None),
            entry("3", "", 1, None),
        ];
        let filter = EntryFilter {
            hidden: 0,
            text: "MILK".to_string(),
        };
        let visible = visible_entries(&entries, &Selection::default(), &filter);
        assert_eq!(ids(visible), vec!["1"]);
    }

    #[test]
    fn test_empty_label_excluded_even_without_text() {
        let entries = vec![entry("1", "", 1, None), entry("2", "x", 1, None)];
        let visible = visible_entries(&entries, &Selection::default(), &EntryFilter::default());
        assert_eq!(ids(visible), vec!["2"]);
    }

    #[test]
    fn test_recompute_falls_back_to_root_for_deleted_category() {
        let categories = vec![cat("A", None)];
        let mut selection = Selection::new(NodeRef::Category("A".into()), &categories);
        selection.recompute(&[]);
        assert_eq!(selection.selected(), &NodeRef::Root);
    }

    #[test]
    fn test_recompute_picks_up_new_children() {
        let mut categories = vec![cat("A", None)];
        let mut selection = Selection::new(NodeRef::Category("A".into()), &categories);
        assert!(!selection.contains(&NodeRef::Category("B".into())));

        categories.push(cat("B", Some("A")));
        selection.recompute(&categories);
        assert!(selection.contains(&NodeRef::Category("B".into())));
    }

    fn any_status() -> impl Strategy<Value = Status> {
        prop::sample::select(Status::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_toggle_twice_is_identity(
            start in 0i32..16,
            status in any_status(),
            statuses in prop::collection::vec(0i32..16, 0..20),
        ) {
            let entries: Vec<Entry> = statuses
                .iter()
                .enumerate()
                .map(|(i, s)| entry(&i.to_string(), "x", *s, None))
                .collect();
            let mut filter = EntryFilter { hidden: start, text: String::new() };
            let before = ids(visible_entries(&entries, &Selection::default(), &filter));

            filter.toggle_status(status);
            filter.toggle_status(status);
            let after = ids(visible_entries(&entries, &Selection::default(), &filter));

            prop_assert_eq!(filter.hidden, start);
            prop_assert_eq!(before, after);
        }

        #[test]
        fn prop_hidden_iff_mask_overlaps(mask in 0i32..16, status in 0i32..16) {
            let e = entry("1", "x", status, None);
            let filter = EntryFilter { hidden: mask, text: String::new() };
            prop_assert_eq!(filter.hides(&e), status & mask != 0);
        }

        #[test]
        fn prop_text_match_ignores_case(label in "[a-zA-Z ]{1,12}", start in 0usize..12, len in 0usize..6) {
            let start = start.min(label.len());
            let end = (start + len).min(label.len());
            let needle = label[start..end].to_uppercase();
            let e = entry("1", &label, 1, None);
            let filter = EntryFilter { hidden: 0, text: needle };
            prop_assert!(filter.matches_text(&e));
        }
    }
}
