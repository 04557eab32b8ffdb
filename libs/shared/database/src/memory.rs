use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::store::{
    CollectionRef, Document, DocumentStore, Query, SnapshotListener, StoreError, SubscriptionHandle,
};

type SharedListener = Arc<dyn Fn(Vec<Document>) + Send + Sync + 'static>;

struct Listener {
    query: Query,
    callback: SharedListener,
}

#[derive(Default)]
struct MemoryState {
    collections: HashMap<CollectionRef, Vec<Document>>,
    listeners: HashMap<u64, Listener>,
    next_listener_id: u64,
}

impl MemoryState {
    fn snapshot(&self, query: &Query) -> Vec<Document> {
        let mut documents = self
            .collections
            .get(&query.collection)
            .cloned()
            .unwrap_or_default();
        query.sort(&mut documents);
        documents
    }

    fn pending_notifications(&self, collection: &CollectionRef) -> Vec<(SharedListener, Vec<Document>)> {
        self.listeners
            .values()
            .filter(|listener| &listener.query.collection == collection)
            .map(|listener| (listener.callback.clone(), self.snapshot(&listener.query)))
            .collect()
    }
}

/// In-process store with push-on-write subscriptions. Used by tests and for
/// running the dashboard without a Supabase project.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A listener panicking must not take the store down with it.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Inserts or replaces a document with a known id and notifies listeners.
    pub fn insert(&self, collection: &CollectionRef, document: Document) {
        let notifications = {
            let mut state = self.lock();
            let documents = state.collections.entry(collection.clone()).or_default();
            match documents.iter_mut().find(|existing| existing.id == document.id) {
                Some(existing) => *existing = document,
                None => documents.push(document),
            }
            state.pending_notifications(collection)
        };
        notify(notifications);
    }

    /// Inserts a JSON row; the row must carry an `id`.
    pub fn insert_value(&self, collection: &CollectionRef, value: Value) -> Result<(), StoreError> {
        let document = Document::from_value(value)
            .ok_or_else(|| StoreError::Malformed(format!("{} row without id", collection)))?;
        self.insert(collection, document);
        Ok(())
    }

    pub fn document(&self, collection: &CollectionRef, id: &str) -> Option<Document> {
        self.lock()
            .collections
            .get(collection)
            .and_then(|documents| documents.iter().find(|d| d.id == id).cloned())
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }
}

fn notify(notifications: Vec<(SharedListener, Vec<Document>)>) {
    // Called with the lock released so listeners may read the store.
    for (callback, documents) in notifications {
        callback(documents);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        Ok(self.lock().snapshot(query))
    }

    async fn get(&self, collection: &CollectionRef, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.document(collection, id))
    }

    async fn update(
        &self,
        collection: &CollectionRef,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let notifications = {
            let mut state = self.lock();
            let document = state
                .collections
                .get_mut(collection)
                .and_then(|documents| documents.iter_mut().find(|d| d.id == id))
                .ok_or_else(|| StoreError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                })?;
            for (key, value) in patch {
                document.fields.insert(key, value);
            }
            debug!("Updated {}/{}", collection, id);
            state.pending_notifications(collection)
        };
        notify(notifications);
        Ok(())
    }

    async fn add(&self, collection: &CollectionRef, mut fields: Map<String, Value>) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        if let Some(parent) = collection.parent() {
            fields.insert(parent.field.clone(), Value::String(parent.id.clone()));
        }
        self.insert(collection, Document::new(id.clone(), fields));
        debug!("Added {}/{}", collection, id);
        Ok(id)
    }

    async fn subscribe(
        &self,
        query: Query,
        listener: SnapshotListener,
    ) -> Result<SubscriptionHandle, StoreError> {
        let callback: SharedListener = Arc::from(listener);
        let (listener_id, initial) = {
            let mut state = self.lock();
            let listener_id = state.next_listener_id;
            state.next_listener_id += 1;
            let initial = state.snapshot(&query);
            state.listeners.insert(listener_id, Listener {
                query: query.clone(),
                callback: callback.clone(),
            });
            (listener_id, initial)
        };

        debug!("Listener {} subscribed to {}", listener_id, query.collection);
        callback(initial);

        let state = Arc::downgrade(&self.state);
        Ok(SubscriptionHandle::new(move || {
            if let Some(state) = state.upgrade() {
                let mut state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                state.listeners.remove(&listener_id);
                debug!("Listener {} released", listener_id);
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Direction;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn every_write_pushes_a_full_snapshot() {
        let store = MemoryStore::new();
        let items = CollectionRef::new("items");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let handle = store
            .subscribe(
                Query::new(items.clone()).order_by("rank", Direction::Ascending),
                Box::new(move |docs| sink.lock().unwrap().push(docs.len())),
            )
            .await
            .unwrap();

        store.insert_value(&items, json!({ "id": "a", "rank": 2 })).unwrap();
        store.insert_value(&items, json!({ "id": "b", "rank": 1 })).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
        drop(handle);
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn subcollection_add_records_the_parent() {
        let store = MemoryStore::new();
        let messages = CollectionRef::sub("messages", "thread_id", "t1");

        let id = store.add(&messages, Map::new()).await.unwrap();
        let stored = store.document(&messages, &id).unwrap();

        assert_eq!(stored.fields["thread_id"], json!("t1"));
    }

    #[tokio::test]
    async fn update_of_unknown_document_is_not_found() {
        let store = MemoryStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let _handle = store
            .subscribe(
                Query::new(CollectionRef::new("items")),
                Box::new(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await
            .unwrap();

        let result = store.update(&CollectionRef::new("items"), "nope", Map::new()).await;

        assert!(matches!(result, Err(StoreError::NotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
