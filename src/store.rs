//! Entry and category store.
//!
//! The backend is authoritative; the client keeps a [`Cache`] of both
//! collections and patches it after each successful remote call. The work is
//! split in two halves:
//!
//! - [`ops`]: stateless remote operations. They take a backend handle and
//!   owned arguments so they can run on spawned tasks, and report failure as
//!   `None`/`false` after logging the cause.
//! - [`Cache`]: synchronous in-memory patches applied when a result arrives.
//!
//! [`EntryStore`] glues both together for sequential callers (CLI, tests).
//! The TUI runs the remote half in the background and applies the cache half
//! when the result event lands, so overlapping mutations resolve as "last
//! response wins".

use crate::model::{
    Category, CategoryId, CategoryPatch, Entry, EntryId, EntryPatch, NewCategory, NewEntry, Status,
};
use crate::remote::Backend;

// ============================================================================
// Cascade report
// ============================================================================

/// One step of the category deletion workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeStep {
    /// Point child categories at the deleted category's parent.
    ReparentChildren,
    /// Point the category's entries at the deleted category's parent.
    ReparentEntries,
    /// Remove the category row itself.
    DeleteRow,
}

impl std::fmt::Display for CascadeStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::ReparentChildren => "moving child categories",
            Self::ReparentEntries => "moving entries",
            Self::DeleteRow => "deleting the category",
        })
    }
}

/// Outcome of [`ops::delete_category`].
///
/// Every step is idempotent, so repeating an aborted deletion resumes where
/// it stopped. Nothing is rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryDeletion {
    Completed {
        children_moved: usize,
        entries_moved: usize,
    },
    Aborted {
        step: CascadeStep,
    },
    /// The category is not in the given category list.
    NotFound,
}

impl CategoryDeletion {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

// ============================================================================
// Remote operations
// ============================================================================

pub mod ops {
    use super::*;
    use crate::remote::{Filter, Table};
    use crate::tree::would_create_cycle;
    use crate::util::sanitize_label;
    use chrono::Utc;
    use serde::de::DeserializeOwned;
    use serde_json::Value;

    fn decode_all<T: DeserializeOwned>(table: Table, rows: Vec<Value>) -> Vec<T> {
        rows.into_iter()
            .filter_map(|row| match serde_json::from_value(row) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!(table = %table, error = %e, "Skipping malformed row");
                    None
                }
            })
            .collect()
    }

    fn decode_first<T: DeserializeOwned>(table: Table, rows: Vec<Value>) -> Option<T> {
        let Some(row) = rows.into_iter().next() else {
            tracing::warn!(table = %table, "Backend returned no rows");
            return None;
        };
        match serde_json::from_value(row) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::error!(table = %table, error = %e, "Malformed row in response");
                None
            }
        }
    }

    fn to_value<T: serde::Serialize>(table: Table, payload: &T) -> Option<Value> {
        match serde_json::to_value(payload) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::error!(table = %table, error = %e, "Failed to encode payload");
                None
            }
        }
    }

    pub async fn load_entries<B: Backend>(backend: &B) -> Option<Vec<Entry>> {
        match backend.select(Table::Entries).await {
            Ok(rows) => Some(decode_all(Table::Entries, rows)),
            Err(e) => {
                tracing::error!(error = %e, retryable = e.is_retryable(), "Failed to load entries");
                None
            }
        }
    }

    pub async fn load_categories<B: Backend>(backend: &B) -> Option<Vec<Category>> {
        match backend.select(Table::Categories).await {
            Ok(rows) => Some(decode_all(Table::Categories, rows)),
            Err(e) => {
                tracing::error!(error = %e, retryable = e.is_retryable(), "Failed to load categories");
                None
            }
        }
    }

    /// Load both collections. `None` unless both loads succeed.
    pub async fn load_all<B: Backend>(backend: &B) -> Option<(Vec<Entry>, Vec<Category>)> {
        let (entries, categories) =
            futures::join!(load_entries(backend), load_categories(backend));
        Some((entries?, categories?))
    }

    /// Insert an entry. The label is sanitized; an empty label is rejected
    /// without a remote call.
    pub async fn add_entry<B: Backend>(backend: &B, mut new: NewEntry) -> Option<Entry> {
        let Some(label) = sanitize_label(&new.label) else {
            tracing::warn!("Refusing to add entry with empty label");
            return None;
        };
        new.label = label;

        let row = to_value(Table::Entries, &new)?;
        match backend.insert(Table::Entries, row).await {
            Ok(rows) => {
                let entry: Entry = decode_first(Table::Entries, rows)?;
                tracing::info!(entry_id = %entry.id, "Entry added");
                Some(entry)
            }
            Err(e) => {
                tracing::error!(error = %e, retryable = e.is_retryable(), "Failed to add entry");
                None
            }
        }
    }

    /// Update one entry and return the row as stored.
    ///
    /// `modified_at` is stamped with the current time unless the patch
    /// carries one. An update that matches no row counts as failure, and a
    /// patch that changes no column is refused locally.
    pub async fn update_entry<B: Backend>(backend: &B, mut patch: EntryPatch) -> Option<Entry> {
        if patch.id.is_empty() {
            tracing::warn!("Refusing to update entry without id");
            return None;
        }
        if patch.is_empty() {
            tracing::warn!(entry_id = %patch.id, "Refusing empty entry update");
            return None;
        }
        if patch.modified_at.is_none() {
            patch.modified_at = Some(Utc::now());
        }

        let body = to_value(Table::Entries, &patch)?;
        match backend
            .update(Table::Entries, body, Filter::eq("id", patch.id.clone()))
            .await
        {
            Ok(rows) if rows.is_empty() => {
                tracing::warn!(entry_id = %patch.id, "Update matched no entry");
                None
            }
            Ok(rows) => {
                let entry: Entry = decode_first(Table::Entries, rows)?;
                tracing::info!(entry_id = %entry.id, "Entry updated");
                Some(entry)
            }
            Err(e) => {
                tracing::error!(
                    entry_id = %patch.id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Failed to update entry"
                );
                None
            }
        }
    }

    pub async fn set_status<B: Backend>(backend: &B, id: EntryId, status: Status) -> Option<Entry> {
        update_entry(backend, EntryPatch::new(id).status(status)).await
    }

    pub async fn rename_entry<B: Backend>(backend: &B, id: EntryId, label: &str) -> Option<Entry> {
        let Some(label) = sanitize_label(label) else {
            tracing::warn!(entry_id = %id, "Refusing to rename entry to empty label");
            return None;
        };
        update_entry(backend, EntryPatch::new(id).label(label)).await
    }

    /// Move an entry under `category` (`None` = the root).
    pub async fn move_entry<B: Backend>(
        backend: &B,
        id: EntryId,
        category: Option<CategoryId>,
    ) -> Option<Entry> {
        update_entry(backend, EntryPatch::new(id).category(category)).await
    }

    /// Replace the markdown body. Blank text clears the column.
    pub async fn set_entry_text<B: Backend>(
        backend: &B,
        id: EntryId,
        text: Option<String>,
    ) -> Option<Entry> {
        let text = text.filter(|t| !t.trim().is_empty());
        update_entry(backend, EntryPatch::new(id).text(text)).await
    }

    pub async fn delete_entry<B: Backend>(backend: &B, id: &str) -> bool {
        match backend.delete(Table::Entries, Filter::eq("id", id)).await {
            Ok(rows) => {
                tracing::info!(entry_id = %id, deleted = rows.len(), "Entry deleted");
                true
            }
            Err(e) => {
                tracing::error!(entry_id = %id, error = %e, "Failed to delete entry");
                false
            }
        }
    }

    /// Insert a category. The label is sanitized; an empty label is rejected
    /// without a remote call.
    pub async fn add_category<B: Backend>(backend: &B, mut new: NewCategory) -> Option<Category> {
        let Some(label) = sanitize_label(&new.label) else {
            tracing::warn!("Refusing to add category with empty label");
            return None;
        };
        new.label = label;

        let row = to_value(Table::Categories, &new)?;
        match backend.insert(Table::Categories, row).await {
            Ok(rows) => {
                let category: Category = decode_first(Table::Categories, rows)?;
                tracing::info!(category_id = %category.id, "Category added");
                Some(category)
            }
            Err(e) => {
                tracing::error!(error = %e, retryable = e.is_retryable(), "Failed to add category");
                None
            }
        }
    }

    async fn update_category<B: Backend>(backend: &B, patch: CategoryPatch) -> Option<Category> {
        let body = to_value(Table::Categories, &patch)?;
        match backend
            .update(Table::Categories, body, Filter::eq("id", patch.id.clone()))
            .await
        {
            Ok(rows) if rows.is_empty() => {
                tracing::warn!(category_id = %patch.id, "Update matched no category");
                None
            }
            Ok(rows) => decode_first(Table::Categories, rows),
            Err(e) => {
                tracing::error!(category_id = %patch.id, error = %e, "Failed to update category");
                None
            }
        }
    }

    pub async fn rename_category<B: Backend>(
        backend: &B,
        id: CategoryId,
        label: &str,
    ) -> Option<Category> {
        let Some(label) = sanitize_label(label) else {
            tracing::warn!(category_id = %id, "Refusing to rename category to empty label");
            return None;
        };
        let patch = CategoryPatch {
            id,
            label: Some(label),
            parent: None,
        };
        update_category(backend, patch).await
    }

    /// Re-parent a category. Moves that would make the category its own
    /// ancestor are rejected before any remote call.
    pub async fn move_category<B: Backend>(
        backend: &B,
        categories: &[Category],
        id: CategoryId,
        parent: Option<CategoryId>,
    ) -> Option<Category> {
        if would_create_cycle(categories, &id, parent.as_deref()) {
            tracing::warn!(category_id = %id, parent = ?parent, "Rejected move: would create a cycle");
            return None;
        }
        let patch = CategoryPatch {
            id,
            label: None,
            parent: Some(parent),
        };
        update_category(backend, patch).await
    }

    /// Delete a category, re-homing its children and entries to its parent.
    ///
    /// Runs the remote steps only; callers reload both collections afterwards
    /// whatever the outcome. Stops at the first failing step.
    pub async fn delete_category<B: Backend>(
        backend: &B,
        categories: &[Category],
        id: &str,
    ) -> CategoryDeletion {
        let Some(target) = categories.iter().find(|c| c.id == id) else {
            tracing::warn!(category_id = %id, "Category to delete not found");
            return CategoryDeletion::NotFound;
        };
        let new_parent = target.parent.clone();

        let children_moved = match backend
            .update(
                Table::Categories,
                serde_json::json!({ "parent": new_parent }),
                Filter::eq("parent", id),
            )
            .await
        {
            Ok(rows) => rows.len(),
            Err(e) => {
                tracing::error!(category_id = %id, error = %e, "Failed to re-parent child categories");
                return CategoryDeletion::Aborted {
                    step: CascadeStep::ReparentChildren,
                };
            }
        };

        let entries_moved = match backend
            .update(
                Table::Entries,
                serde_json::json!({ "category": new_parent }),
                Filter::eq("category", id),
            )
            .await
        {
            Ok(rows) => rows.len(),
            Err(e) => {
                tracing::error!(category_id = %id, error = %e, "Failed to re-parent entries");
                return CategoryDeletion::Aborted {
                    step: CascadeStep::ReparentEntries,
                };
            }
        };

        if let Err(e) = backend.delete(Table::Categories, Filter::eq("id", id)).await {
            tracing::error!(category_id = %id, error = %e, "Failed to delete category row");
            return CategoryDeletion::Aborted {
                step: CascadeStep::DeleteRow,
            };
        }

        tracing::info!(
            category_id = %id,
            children_moved,
            entries_moved,
            "Category deleted"
        );
        CategoryDeletion::Completed {
            children_moved,
            entries_moved,
        }
    }
}

// ============================================================================
// In-memory cache
// ============================================================================

/// Client-side copy of both collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cache {
    pub entries: Vec<Entry>,
    pub categories: Vec<Category>,
}

impl Cache {
    pub fn entry(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn replace_all(&mut self, entries: Vec<Entry>, categories: Vec<Category>) {
        self.entries = entries;
        self.categories = categories;
    }

    pub fn push_entry(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    /// Swap in the server's copy of an entry. Rows no longer cached (deleted
    /// meanwhile) are not resurrected.
    pub fn replace_entry(&mut self, entry: Entry) -> bool {
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(slot) => {
                *slot = entry;
                true
            }
            None => {
                tracing::debug!(entry_id = %entry.id, "Updated entry no longer cached");
                false
            }
        }
    }

    pub fn remove_entry(&mut self, id: &str) -> Option<Entry> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(pos))
    }

    pub fn push_category(&mut self, category: Category) {
        self.categories.push(category);
    }

    pub fn replace_category(&mut self, category: Category) -> bool {
        match self.categories.iter_mut().find(|c| c.id == category.id) {
            Some(slot) => {
                *slot = category;
                true
            }
            None => false,
        }
    }
}

// ============================================================================
// Sequential store
// ============================================================================

/// A backend plus its cache, for callers that await each operation.
#[derive(Debug)]
pub struct EntryStore<B: Backend> {
    backend: B,
    cache: Cache,
}

impl<B: Backend> EntryStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cache: Cache::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn entries(&self) -> &[Entry] {
        &self.cache.entries
    }

    pub fn categories(&self) -> &[Category] {
        &self.cache.categories
    }

    pub fn entry(&self, id: &str) -> Option<&Entry> {
        self.cache.entry(id)
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.cache.category(id)
    }

    /// Reload both collections. The cache is left alone if either load fails.
    pub async fn refresh(&mut self) -> bool {
        match ops::load_all(&self.backend).await {
            Some((entries, categories)) => {
                tracing::debug!(
                    entries = entries.len(),
                    categories = categories.len(),
                    "Store refreshed"
                );
                self.cache.replace_all(entries, categories);
                true
            }
            None => false,
        }
    }

    pub async fn add_entry(&mut self, new: NewEntry) -> Option<Entry> {
        let entry = ops::add_entry(&self.backend, new).await?;
        self.cache.push_entry(entry.clone());
        Some(entry)
    }

    pub async fn update_entry(&mut self, patch: EntryPatch) -> Option<Entry> {
        let entry = ops::update_entry(&self.backend, patch).await?;
        self.cache.replace_entry(entry.clone());
        Some(entry)
    }

    pub async fn set_status(&mut self, id: &str, status: Status) -> Option<Entry> {
        let entry = ops::set_status(&self.backend, id.to_string(), status).await?;
        self.cache.replace_entry(entry.clone());
        Some(entry)
    }

    pub async fn rename_entry(&mut self, id: &str, label: &str) -> Option<Entry> {
        let entry = ops::rename_entry(&self.backend, id.to_string(), label).await?;
        self.cache.replace_entry(entry.clone());
        Some(entry)
    }

    pub async fn move_entry(&mut self, id: &str, category: Option<CategoryId>) -> Option<Entry> {
        let entry = ops::move_entry(&self.backend, id.to_string(), category).await?;
        self.cache.replace_entry(entry.clone());
        Some(entry)
    }

    pub async fn set_entry_text(&mut self, id: &str, text: Option<String>) -> Option<Entry> {
        let entry = ops::set_entry_text(&self.backend, id.to_string(), text).await?;
        self.cache.replace_entry(entry.clone());
        Some(entry)
    }

    pub async fn delete_entry(&mut self, id: &str) -> bool {
        if !ops::delete_entry(&self.backend, id).await {
            return false;
        }
        self.cache.remove_entry(id);
        true
    }

    pub async fn add_category(&mut self, new: NewCategory) -> Option<Category> {
        let category = ops::add_category(&self.backend, new).await?;
        self.cache.push_category(category.clone());
        Some(category)
    }

    pub async fn rename_category(&mut self, id: &str, label: &str) -> Option<Category> {
        let category = ops::rename_category(&self.backend, id.to_string(), label).await?;
        self.cache.replace_category(category.clone());
        Some(category)
    }

    pub async fn move_category(
        &mut self,
        id: &str,
        parent: Option<CategoryId>,
    ) -> Option<Category> {
        let category =
            ops::move_category(&self.backend, &self.cache.categories, id.to_string(), parent)
                .await?;
        self.cache.replace_category(category.clone());
        Some(category)
    }

    /// Cascading delete followed by a full reload, whether or not every step
    /// succeeded.
    pub async fn delete_category(&mut self, id: &str) -> CategoryDeletion {
        let outcome = ops::delete_category(&self.backend, &self.cache.categories, id).await;
        if outcome != CategoryDeletion::NotFound && !self.refresh().await {
            tracing::warn!(category_id = %id, "Reload after category deletion failed");
        }
        outcome
    }
}
