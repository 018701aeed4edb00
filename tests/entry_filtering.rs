//! Integration tests for what the entry list shows: selection closure over
//! the category tree combined with the status mask and label filter.

use apunto::filter::{visible_entries, EntryFilter, Selection};
use apunto::model::Status;
use apunto::remote::{MemoryBackend, Table};
use apunto::store::EntryStore;
use apunto::tree::NodeRef;
use pretty_assertions::assert_eq;
use serde_json::json;

fn entry(id: &str, label: &str, category: Option<&str>, status: Status) -> serde_json::Value {
    json!({
        "id": id, "label": label, "text": null, "status": status.bits(),
        "category": category, "created_at": "2024-03-01T09:00:00Z", "modified_at": null
    })
}

async fn store() -> EntryStore<MemoryBackend> {
    let backend = MemoryBackend::new()
        .with_rows(
            Table::Categories,
            vec![
                json!({ "id": "A", "label": "Work", "parent": null }),
                json!({ "id": "B", "label": "Projects", "parent": "A" }),
                json!({ "id": "C", "label": "Home", "parent": null }),
            ],
        )
        .with_rows(
            Table::Entries,
            vec![
                entry("1", "Call plumber", None, Status::Urgent),
                entry("2", "Write report", Some("A"), Status::New),
                entry("3", "Draft slides", Some("B"), Status::Done),
                entry("4", "Buy groceries", Some("C"), Status::Waiting),
                entry("5", "", Some("C"), Status::New),
            ],
        );
    let mut store = EntryStore::new(backend);
    assert!(store.refresh().await);
    store
}

fn ids(entries: Vec<&apunto::model::Entry>) -> Vec<&str> {
    entries.into_iter().map(|e| e.id.as_str()).collect()
}

#[tokio::test]
async fn test_root_shows_everything_with_a_label() {
    let store = store().await;
    let selection = Selection::new(NodeRef::Root, store.categories());
    let shown = visible_entries(store.entries(), &selection, &EntryFilter::default());
    assert_eq!(ids(shown), vec!["1", "2", "3", "4"]);
}

#[tokio::test]
async fn test_category_includes_descendants() {
    let store = store().await;
    let selection = Selection::new(NodeRef::Category("A".to_string()), store.categories());
    let shown = visible_entries(store.entries(), &selection, &EntryFilter::default());
    assert_eq!(ids(shown), vec!["2", "3"]);
}

#[tokio::test]
async fn test_status_mask_and_text_combine() {
    let store = store().await;
    let selection = Selection::new(NodeRef::Root, store.categories());
    let mut filter = EntryFilter::default();
    filter.hide(Status::Done);
    filter.text = "R".to_string();
    let shown = visible_entries(store.entries(), &selection, &filter);
    assert_eq!(ids(shown), vec!["1", "2", "4"]);

    filter.toggle_status(Status::Done);
    filter.toggle_status(Status::Done);
    assert!(filter.is_hidden(Status::Done));
}

#[tokio::test]
async fn test_status_change_moves_entry_out_of_filtered_view() {
    let mut store = store().await;
    let mut filter = EntryFilter::default();
    filter.hide(Status::Done);

    store.set_status("2", Status::Done).await.unwrap();

    let selection = Selection::new(NodeRef::Category("A".to_string()), store.categories());
    let shown = visible_entries(store.entries(), &selection, &filter);
    assert!(shown.is_empty());
}

#[tokio::test]
async fn test_moved_entry_follows_its_category() {
    let mut store = store().await;
    store.move_entry("4", Some("B".to_string())).await.unwrap();

    let selection = Selection::new(NodeRef::Category("A".to_string()), store.categories());
    let shown = visible_entries(store.entries(), &selection, &EntryFilter::default());
    assert_eq!(ids(shown), vec!["2", "3", "4"]);
}
