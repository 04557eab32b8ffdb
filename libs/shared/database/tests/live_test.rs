use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use shared_database::{CollectionRef, Direction, LiveCollection, MemoryStore, Query};

#[derive(Debug, Deserialize, PartialEq)]
struct Item {
    id: String,
    rank: i64,
}

fn items_query() -> Query {
    Query::new(CollectionRef::new("items")).order_by("rank", Direction::Ascending)
}

#[tokio::test]
async fn test_first_snapshot_clears_loading_flag() {
    let store = MemoryStore::new();
    store.insert_value(&CollectionRef::new("items"), json!({ "id": "a", "rank": 1 })).unwrap();

    let live = LiveCollection::<Item>::open(&store, items_query()).await.unwrap();

    assert!(!live.is_loading());
    assert_eq!(live.current().len(), 1);
}

#[tokio::test]
async fn test_every_change_replaces_the_whole_list() {
    let store = MemoryStore::new();
    let items = CollectionRef::new("items");
    let mut live = LiveCollection::<Item>::open(&store, items_query()).await.unwrap();
    let before = live.loaded().await.unwrap();

    store.insert_value(&items, json!({ "id": "b", "rank": 5 })).unwrap();
    store.insert_value(&items, json!({ "id": "a", "rank": 1 })).unwrap();
    let after = live.changed().await.unwrap();

    assert!(!Arc::ptr_eq(&before, &after));
    let ids: Vec<_> = after.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test]
async fn test_malformed_documents_are_skipped() {
    let store = MemoryStore::new();
    let items = CollectionRef::new("items");
    store.insert_value(&items, json!({ "id": "ok", "rank": 3 })).unwrap();
    store.insert_value(&items, json!({ "id": "bad", "rank": "three" })).unwrap();

    let live = LiveCollection::<Item>::open(&store, items_query()).await.unwrap();

    assert_eq!(*live.current(), vec![Item { id: "ok".into(), rank: 3 }]);
}

#[tokio::test]
async fn test_dropping_live_collection_releases_listener() {
    let store = MemoryStore::new();
    let live = LiveCollection::<Item>::open(&store, items_query()).await.unwrap();
    assert_eq!(store.listener_count(), 1);

    drop(live);
    assert_eq!(store.listener_count(), 0);
}

#[tokio::test]
async fn test_stream_yields_current_then_changes() {
    use futures::StreamExt;

    let store = MemoryStore::new();
    let items = CollectionRef::new("items");
    store.insert_value(&items, json!({ "id": "a", "rank": 1 })).unwrap();

    let live = LiveCollection::<Item>::open(&store, items_query()).await.unwrap();
    let mut stream = Box::pin(live.into_stream());

    let first = stream.next().await.unwrap();
    assert_eq!(first.len(), 1);

    store.insert_value(&items, json!({ "id": "b", "rank": 2 })).unwrap();
    let second = stream.next().await.unwrap();
    assert_eq!(second.len(), 2);
}
