//! Category tree construction.
//!
//! Categories arrive as a flat list of parent pointers. This module turns that
//! list into a rooted tree under a synthetic "All categories" node, computes the
//! set of nodes selected by picking one node (the node plus all descendants),
//! and flattens the tree into display rows for the category panel.
//!
//! Everything here is a pure function of the category list and is recomputed
//! from scratch whenever the list changes. The backend does not prevent parent
//! cycles, so every traversal carries a visited set and terminates on malformed
//! input: members of a cycle are simply unreachable from the root.

use crate::model::{Category, CategoryId};
use std::collections::{HashMap, HashSet};

/// Label of the synthetic root node.
pub const ROOT_LABEL: &str = "All categories";

// ============================================================================
// Node references
// ============================================================================

/// Reference to a node of the category tree.
///
/// `Root` is the synthetic node above all top-level categories. Records never
/// store it: an absent parent or an absent entry category is `None`, and is
/// mapped to `Root` only when checking tree membership.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Root,
    Category(CategoryId),
}

impl NodeRef {
    /// Tree node an entry with the given category belongs to.
    pub fn for_entry(category: Option<&CategoryId>) -> Self {
        match category {
            Some(id) => Self::Category(id.clone()),
            None => Self::Root,
        }
    }

    pub fn category_id(&self) -> Option<&CategoryId> {
        match self {
            Self::Root => None,
            Self::Category(id) => Some(id),
        }
    }

    /// Value to store in a `parent`/`category` column when pointing at this node.
    pub fn into_column(self) -> Option<CategoryId> {
        match self {
            Self::Root => None,
            Self::Category(id) => Some(id),
        }
    }
}

// ============================================================================
// Tree building
// ============================================================================

/// A category with its children attached. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryNode {
    pub id: NodeRef,
    pub label: String,
    pub children: Vec<CategoryNode>,
}

/// Group categories by parent id, keeping input order inside each group.
/// Parentless categories land under `None`.
fn group_by_parent(categories: &[Category]) -> HashMap<Option<&str>, Vec<&Category>> {
    let mut children: HashMap<Option<&str>, Vec<&Category>> = HashMap::new();
    for category in categories {
        children
            .entry(category.parent.as_deref())
            .or_default()
            .push(category);
    }
    children
}

/// Build the category tree.
///
/// Returns a single-element vector holding the synthetic root. Children keep
/// the relative order of `categories`. Categories whose parent does not exist
/// are unreachable and do not appear.
pub fn build_tree(categories: &[Category]) -> Vec<CategoryNode> {
    let children = group_by_parent(categories);
    let mut visited = HashSet::new();
    let root = CategoryNode {
        id: NodeRef::Root,
        label: ROOT_LABEL.to_string(),
        children: attach_children(None, &children, &mut visited),
    };
    vec![root]
}

fn attach_children<'a>(
    parent: Option<&'a str>,
    children: &HashMap<Option<&'a str>, Vec<&'a Category>>,
    visited: &mut HashSet<&'a str>,
) -> Vec<CategoryNode> {
    let Some(group) = children.get(&parent) else {
        return Vec::new();
    };

    let mut nodes = Vec::with_capacity(group.len());
    for category in group {
        if !visited.insert(category.id.as_str()) {
            continue;
        }
        nodes.push(CategoryNode {
            id: NodeRef::Category(category.id.clone()),
            label: category.display_label().to_string(),
            children: attach_children(Some(category.id.as_str()), children, visited),
        });
    }
    nodes
}

// ============================================================================
// Selection closure
// ============================================================================

/// The selected node followed by all of its descendants in pre-order.
///
/// For `Root` the traversal starts at the parentless categories; `Root` itself
/// stays at the head so entries without a category count as selected. Each
/// node appears once, even if the parent graph contains a cycle.
pub fn selection_closure(selected: &NodeRef, categories: &[Category]) -> Vec<NodeRef> {
    let children = group_by_parent(categories);
    let mut closure = vec![selected.clone()];
    let mut visited: HashSet<&str> = HashSet::new();
    if let NodeRef::Category(id) = selected {
        visited.insert(id.as_str());
    }

    let start = selected.category_id().map(String::as_str);
    let mut stack: Vec<&Category> = children
        .get(&start)
        .map(|group| group.iter().rev().copied().collect())
        .unwrap_or_default();

    while let Some(category) = stack.pop() {
        if !visited.insert(category.id.as_str()) {
            continue;
        }
        closure.push(NodeRef::Category(category.id.clone()));
        if let Some(group) = children.get(&Some(category.id.as_str())) {
            stack.extend(group.iter().rev().copied());
        }
    }

    closure
}

// ============================================================================
// Re-parent validation
// ============================================================================

/// Whether moving category `id` under `new_parent` would close a cycle.
///
/// Walks the ancestor chain of `new_parent`. A chain that revisits a node
/// (data already cyclic) also counts as a cycle, so the move is refused.
pub fn would_create_cycle(categories: &[Category], id: &str, new_parent: Option<&str>) -> bool {
    let parents: HashMap<&str, Option<&str>> = categories
        .iter()
        .map(|c| (c.id.as_str(), c.parent.as_deref()))
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut current = new_parent;
    while let Some(node) = current {
        if node == id || !seen.insert(node) {
            return true;
        }
        current = parents.get(node).copied().flatten();
    }
    false
}

/// Human-readable path of a category, e.g. `Work / Projects / Q3`.
///
/// Unknown ids yield `None`. The walk stops at the first repeated node.
pub fn label_path(categories: &[Category], id: &str) -> Option<String> {
    let by_id: HashMap<&str, &Category> =
        categories.iter().map(|c| (c.id.as_str(), c)).collect();

    let mut labels = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut current = Some(*by_id.get(id)?);
    while let Some(category) = current {
        if !seen.insert(category.id.as_str()) {
            break;
        }
        labels.push(category.display_label());
        current = category
            .parent
            .as_deref()
            .and_then(|p| by_id.get(p).copied());
    }

    labels.reverse();
    Some(labels.join(" / "))
}

// ============================================================================
// Display rows
// ============================================================================

/// One visible row of the category panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub node: NodeRef,
    pub label: String,
    /// Nesting depth (0 = the root row).
    pub depth: usize,
    pub has_children: bool,
    pub is_expanded: bool,
}

/// Flatten a tree into display rows, hiding the children of collapsed nodes.
pub fn flatten(tree: &[CategoryNode], collapsed: &HashSet<NodeRef>) -> Vec<TreeRow> {
    let mut rows = Vec::new();
    for node in tree {
        push_rows(node, 0, collapsed, &mut rows);
    }
    rows
}

fn push_rows(
    node: &CategoryNode,
    depth: usize,
    collapsed: &HashSet<NodeRef>,
    rows: &mut Vec<TreeRow>,
) {
    let is_expanded = !collapsed.contains(&node.id);
    rows.push(TreeRow {
        node: node.id.clone(),
        label: node.label.clone(),
        depth,
        has_children: !node.children.is_empty(),
        is_expanded,
    });

    if is_expanded {
        for child in &node.children {
            push_rows(child, depth + 1, collapsed, rows);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn cat(id: &str, parent: Option<&str>) -> Category {
        Category {
            id: id.to_string(),
            label: Some(id.to_uppercase()),
            parent: parent.map(str::to_string),
        }
    }

    fn node(id: &str) -> NodeRef {
        NodeRef::Category(id.to_string())
    }

    fn child_ids(node: &CategoryNode) -> Vec<NodeRef> {
        node.children.iter().map(|c| c.id.clone()).collect()
    }

    #[test]
    fn test_empty_list_yields_bare_root() {
        let tree = build_tree(&[]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, NodeRef::Root);
        assert_eq!(tree[0].label, ROOT_LABEL);
        assert!(tree[0].children.is_empty());
    }

    #[test]
    fn test_nested_tree_keeps_input_order() {
        let categories = vec![
            cat("work", None),
            cat("home", None),
            cat("q3", Some("work")),
            cat("garden", Some("home")),
            cat("q1", Some("work")),
        ];
        let tree = build_tree(&categories);
        let root = &tree[0];

        assert_eq!(child_ids(root), vec![node("work"), node("home")]);
        assert_eq!(child_ids(&root.children[0]), vec![node("q3"), node("q1")]);
        assert_eq!(child_ids(&root.children[1]), vec![node("garden")]);
        assert_eq!(root.children[0].label, "WORK");
    }

    #[test]
    fn test_dangling_parent_is_unreachable() {
        let categories = vec![cat("a", None), cat("orphan", Some("missing"))];
        let tree = build_tree(&categories);
        assert_eq!(child_ids(&tree[0]), vec![node("a")]);
        assert!(tree[0].children[0].children.is_empty());
    }

    #[test]
    fn test_cycle_terminates_and_is_unreachable() {
        let categories = vec![cat("a", Some("b")), cat("b", Some("a")), cat("c", None)];
        let tree = build_tree(&categories);
        assert_eq!(child_ids(&tree[0]), vec![node("c")]);
    }

    #[test]
    fn test_closure_of_category_is_preorder() {
        let categories = vec![
            cat("a", None),
            cat("b", Some("a")),
            cat("c", Some("b")),
            cat("d", Some("a")),
            cat("e", None),
        ];
        let closure = selection_closure(&node("a"), &categories);
        assert_eq!(closure, vec![node("a"), node("b"), node("c"), node("d")]);
    }

    #[test]
    fn test_closure_of_root_keeps_root_first() {
        let categories = vec![cat("a", None), cat("b", Some("a")), cat("x", Some("gone"))];
        let closure = selection_closure(&NodeRef::Root, &categories);
        assert_eq!(closure, vec![NodeRef::Root, node("a"), node("b")]);
    }

    #[test]
    fn test_closure_of_leaf_is_itself() {
        let categories = vec![cat("a", None), cat("b", Some("a"))];
        assert_eq!(selection_closure(&node("b"), &categories), vec![node("b")]);
    }

    #[test]
    fn test_closure_terminates_on_cycle() {
        let categories = vec![cat("a", Some("c")), cat("b", Some("a")), cat("c", Some("b"))];
        let closure = selection_closure(&node("a"), &categories);
        assert_eq!(closure, vec![node("a"), node("b"), node("c")]);
    }

    #[test]
    fn test_would_create_cycle() {
        let categories = vec![cat("a", None), cat("b", Some("a")), cat("c", Some("b"))];

        assert!(would_create_cycle(&categories, "a", Some("c")));
        assert!(would_create_cycle(&categories, "a", Some("a")));
        assert!(!would_create_cycle(&categories, "c", Some("a")));
        assert!(!would_create_cycle(&categories, "b", None));
    }

    #[test]
    fn test_would_create_cycle_on_already_cyclic_data() {
        let categories = vec![cat("a", Some("b")), cat("b", Some("a")), cat("z", None)];
        assert!(would_create_cycle(&categories, "z", Some("a")));
    }

    #[test]
    fn test_label_path() {
        let categories = vec![cat("a", None), cat("b", Some("a")), cat("c", Some("b"))];
        assert_eq!(label_path(&categories, "c").as_deref(), Some("A / B / C"));
        assert_eq!(label_path(&categories, "a").as_deref(), Some("A"));
        assert_eq!(label_path(&categories, "nope"), None);
    }

    #[test]
    fn test_flatten_respects_collapsed() {
        let categories = vec![cat("a", None), cat("b", Some("a")), cat("c", None)];
        let tree = build_tree(&categories);

        let rows = flatten(&tree, &HashSet::new());
        let labels: Vec<_> = rows.iter().map(|r| (r.label.as_str(), r.depth)).collect();
        assert_eq!(
            labels,
            vec![(ROOT_LABEL, 0), ("A", 1), ("B", 2), ("C", 1)]
        );
        assert!(rows[1].has_children);
        assert!(!rows[2].has_children);

        let collapsed: HashSet<NodeRef> = [node("a")].into_iter().collect();
        let rows = flatten(&tree, &collapsed);
        assert_eq!(rows.len(), 3);
        assert!(!rows[1].is_expanded);

        let collapsed: HashSet<NodeRef> = [NodeRef::Root].into_iter().collect();
        assert_eq!(flatten(&tree, &collapsed).len(), 1);
    }

    /// Acyclic forest: category `i` may only point at a category with a smaller index.
    fn forest() -> impl Strategy<Value = Vec<Category>> {
        prop::collection::vec(any::<Option<prop::sample::Index>>(), 0..40).prop_map(|parents| {
            parents
                .iter()
                .enumerate()
                .map(|(i, parent)| {
                    let parent = match parent {
                        Some(idx) if i > 0 => Some(format!("c{}", idx.index(i))),
                        _ => None,
                    };
                    Category {
                        id: format!("c{}", i),
                        label: None,
                        parent,
                    }
                })
                .collect()
        })
    }

    fn count_nodes(node: &CategoryNode) -> usize {
        1 + node.children.iter().map(count_nodes).sum::<usize>()
    }

    fn check_children(node: &CategoryNode, categories: &[Category]) {
        let parent = node.id.category_id().map(String::as_str);
        let expected: Vec<NodeRef> = categories
            .iter()
            .filter(|c| c.parent.as_deref() == parent)
            .map(|c| NodeRef::Category(c.id.clone()))
            .collect();
        assert_eq!(child_ids(node), expected);
        for child in &node.children {
            check_children(child, categories);
        }
    }

    fn descendants(id: &str, categories: &[Category], out: &mut HashSet<String>) {
        for c in categories.iter().filter(|c| c.parent.as_deref() == Some(id)) {
            out.insert(c.id.clone());
            descendants(&c.id, categories, out);
        }
    }

    proptest! {
        #[test]
        fn prop_tree_has_one_node_per_category(categories in forest()) {
            let tree = build_tree(&categories);
            prop_assert_eq!(tree.len(), 1);
            prop_assert_eq!(count_nodes(&tree[0]), categories.len() + 1);
            check_children(&tree[0], &categories);
        }

        #[test]
        fn prop_closure_is_exact_subtree(categories in forest(), pick in any::<prop::sample::Index>()) {
            prop_assume!(!categories.is_empty());
            let chosen = &categories[pick.index(categories.len())].id;

            let closure = selection_closure(&NodeRef::Category(chosen.clone()), &categories);
            prop_assert_eq!(&closure[0], &NodeRef::Category(chosen.clone()));

            let ids: Vec<String> = closure[1..]
                .iter()
                .filter_map(|n| n.category_id().cloned())
                .collect();
            let unique: HashSet<String> = ids.iter().cloned().collect();
            prop_assert_eq!(unique.len(), ids.len());

            let mut expected = HashSet::new();
            descendants(chosen, &categories, &mut expected);
            prop_assert_eq!(unique, expected);
        }

        #[test]
        fn prop_root_closure_covers_everything(categories in forest()) {
            let closure = selection_closure(&NodeRef::Root, &categories);
            prop_assert_eq!(closure.len(), categories.len() + 1);
        }
    }
}
