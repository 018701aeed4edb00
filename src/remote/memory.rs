use super::{Backend, BackendError, Filter, Table};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Kind of backend call, used to script failures and inspect call logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<Table, Vec<Value>>,
    next_id: u64,
    failures: Vec<(Op, Table)>,
    calls: Vec<(Op, Table)>,
}

/// In-process [`Backend`] holding rows in memory.
///
/// Behaves like the hosted backend closely enough for store tests: inserts
/// get an id and defaults, mutations return the affected rows, filters use
/// [`Filter::matches`]. Clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection with rows.
    pub fn with_rows(self, table: Table, rows: Vec<Value>) -> Self {
        self.lock().tables.entry(table).or_default().extend(rows);
        self
    }

    /// Current rows of a collection.
    pub fn rows(&self, table: Table) -> Vec<Value> {
        self.lock().tables.get(&table).cloned().unwrap_or_default()
    }

    /// Make the next `op` on `table` fail with a server error.
    pub fn fail_next(&self, op: Op, table: Table) {
        self.lock().failures.push((op, table));
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<(Op, Table)> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Log the call and consume a scripted failure if one matches.
    fn begin(&self, op: Op, table: Table) -> Result<MutexGuard<'_, State>, BackendError> {
        let mut state = self.lock();
        state.calls.push((op, table));
        if let Some(pos) = state.failures.iter().position(|f| *f == (op, table)) {
            state.failures.remove(pos);
            return Err(BackendError::Status {
                status: 500,
                message: format!("scripted {:?} failure on {}", op, table),
            });
        }
        Ok(state)
    }
}

fn as_object(value: Value) -> Result<Map<String, Value>, BackendError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::InvalidRequest(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

impl Backend for MemoryBackend {
    async fn select(&self, table: Table) -> Result<Vec<Value>, BackendError> {
        let state = self.begin(Op::Select, table)?;
        Ok(state.tables.get(&table).cloned().unwrap_or_default())
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Vec<Value>, BackendError> {
        let mut row = as_object(row)?;
        let mut state = self.begin(Op::Insert, table)?;

        if !row.contains_key("id") {
            state.next_id += 1;
            row.insert("id".to_string(), Value::from(format!("m{}", state.next_id)));
        }
        let defaults: &[&str] = match table {
            Table::Entries => &["text", "category", "modified_at"],
            Table::Categories => &["label", "parent"],
        };
        for key in defaults {
            row.entry(key.to_string()).or_insert(Value::Null);
        }
        if table == Table::Entries {
            row.entry("created_at".to_string())
                .or_insert_with(|| Value::from(Utc::now().to_rfc3339()));
        }

        let row = Value::Object(row);
        state.tables.entry(table).or_default().push(row.clone());
        Ok(vec![row])
    }

    async fn update(
        &self,
        table: Table,
        patch: Value,
        filter: Filter,
    ) -> Result<Vec<Value>, BackendError> {
        let patch = as_object(patch)?;
        let mut state = self.begin(Op::Update, table)?;

        let mut updated = Vec::new();
        for row in state.tables.entry(table).or_default().iter_mut() {
            if !filter.matches(row) {
                continue;
            }
            if let Value::Object(fields) = row {
                for (key, value) in &patch {
                    fields.insert(key.clone(), value.clone());
                }
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, table: Table, filter: Filter) -> Result<Vec<Value>, BackendError> {
        let mut state = self.begin(Op::Delete, table)?;
        let rows = state.tables.entry(table).or_default();
        let (deleted, kept): (Vec<Value>, Vec<Value>) =
            rows.drain(..).partition(|row| filter.matches(row));
        *rows = kept;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_fills_id_and_defaults() {
        let backend = MemoryBackend::new();
        let rows = backend
            .insert(Table::Entries, json!({ "label": "x", "status": 1 }))
            .await
            .unwrap();

        assert_eq!(rows[0]["id"], "m1");
        assert_eq!(rows[0]["category"], Value::Null);
        assert!(rows[0]["created_at"].is_string());
        assert_eq!(backend.rows(Table::Entries).len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete_by_filter() {
        let backend = MemoryBackend::new().with_rows(
            Table::Categories,
            vec![
                json!({ "id": "a", "label": "A", "parent": null }),
                json!({ "id": "b", "label": "B", "parent": "a" }),
                json!({ "id": "c", "label": "C", "parent": "a" }),
            ],
        );

        let updated = backend
            .update(Table::Categories, json!({ "parent": null }), Filter::eq("parent", "a"))
            .await
            .unwrap();
        assert_eq!(updated.len(), 2);

        let deleted = backend
            .delete(Table::Categories, Filter::eq("id", "a"))
            .await
            .unwrap();
        assert_eq!(deleted.len(), 1);
        assert_eq!(backend.rows(Table::Categories).len(), 2);
    }

    #[tokio::test]
    async fn test_scripted_failure_fires_once() {
        let backend = MemoryBackend::new();
        backend.fail_next(Op::Select, Table::Entries);

        assert!(backend.select(Table::Entries).await.is_err());
        assert!(backend.select(Table::Entries).await.is_ok());
        assert_eq!(
            backend.calls(),
            vec![(Op::Select, Table::Entries), (Op::Select, Table::Entries)]
        );
    }
}
