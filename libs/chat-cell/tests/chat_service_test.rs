use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use mockall::mock;
use serde_json::{json, Map, Value};

use chat_cell::error::ChatError;
use chat_cell::services::chat::*;
use shared_database::{
    CollectionRef, Document, DocumentStore, MemoryStore, Query, SnapshotListener, StoreError,
    SubscriptionHandle,
};
use shared_utils::test_utils::MockSupabaseResponses;

mock! {
    pub Store {}

    #[async_trait]
    impl DocumentStore for Store {
        async fn list(&self, query: &Query) -> Result<Vec<Document>, StoreError>;
        async fn get(&self, collection: &CollectionRef, id: &str) -> Result<Option<Document>, StoreError>;
        async fn update(
            &self,
            collection: &CollectionRef,
            id: &str,
            patch: Map<String, Value>,
        ) -> Result<(), StoreError>;
        async fn add(&self, collection: &CollectionRef, fields: Map<String, Value>) -> Result<String, StoreError>;
        async fn subscribe(
            &self,
            query: Query,
            listener: SnapshotListener,
        ) -> Result<SubscriptionHandle, StoreError>;
    }
}

fn seeded() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .insert_value(&threads_collection(), MockSupabaseResponses::chat_thread_row("t1", "Jane Doe", true))
        .unwrap();
    let mut older = MockSupabaseResponses::chat_thread_row("t2", "John Smith", false);
    older["last_message_time"] = json!("2024-05-01T10:00:00Z");
    store.insert_value(&threads_collection(), older).unwrap();

    store
        .insert_value(
            &messages_collection("t1"),
            MockSupabaseResponses::message_row("m2", "t1", "Second", "2024-06-01T10:00:00Z"),
        )
        .unwrap();
    store
        .insert_value(
            &messages_collection("t1"),
            MockSupabaseResponses::message_row("m1", "t1", "First", "2024-06-01T09:00:00Z"),
        )
        .unwrap();
    store
}

#[tokio::test]
async fn test_threads_newest_first_with_unread_count() {
    let service = ChatService::new(Arc::new(seeded()));
    let threads = service.list_threads().await.unwrap();

    assert_eq!(threads[0].id, "t1");
    assert_eq!(threads[1].id, "t2");
    assert_eq!(unread_count(&threads), 1);
}

#[tokio::test]
async fn test_messages_oldest_first() {
    let service = ChatService::new(Arc::new(seeded()));
    let messages = service.list_messages("t1").await.unwrap();

    let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["First", "Second"]);
    assert!(service.list_messages("t2").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_send_appends_and_updates_summary() {
    let store = seeded();
    let service = ChatService::new(Arc::new(store.clone()));

    let sent = service.send_message("t1", "admin-1", "  See you at 9  ").await.unwrap();

    assert_eq!(sent.message.text, "See you at 9");
    assert_eq!(sent.message.thread_id, "t1");
    assert!(!sent.thread.unread_by_admin);
    assert!(sent.thread.unread_by_patient);

    let stored = store.document(&messages_collection("t1"), &sent.message.id).unwrap();
    assert_eq!(stored.fields["sender_id"], json!("admin-1"));
    assert_eq!(stored.fields["thread_id"], json!("t1"));

    let thread = store.document(&threads_collection(), "t1").unwrap();
    assert_eq!(thread.fields["last_message"], json!("See you at 9"));
    assert_eq!(thread.fields["unread_by_admin"], json!(false));
    assert_eq!(thread.fields["unread_by_patient"], json!(true));

    let messages = service.list_messages("t1").await.unwrap();
    assert_eq!(messages.last().unwrap().id, sent.message.id);
}

#[tokio::test]
async fn test_blank_message_is_rejected_before_any_write() {
    let store = seeded();
    let service = ChatService::new(Arc::new(store.clone()));

    assert_matches!(service.send_message("t1", "admin-1", " \n ").await, Err(ChatError::EmptyMessage));
    assert_eq!(service.list_messages("t1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_send_to_unknown_thread_fails() {
    let service = ChatService::new(Arc::new(seeded()));
    assert_matches!(
        service.send_message("nope", "admin-1", "hi").await,
        Err(ChatError::ThreadNotFound(id)) if id == "nope"
    );
}

#[tokio::test]
async fn test_failed_summary_reports_stale_state_and_message_id() {
    let thread = Document::from_value(MockSupabaseResponses::chat_thread_row("t1", "Jane Doe", true)).unwrap();

    let mut store = MockStore::new();
    store.expect_get().returning(move |_, _| Ok(Some(thread.clone())));
    store
        .expect_add()
        .times(1)
        .returning(|_, _| Ok("m-new".to_string()));
    store
        .expect_update()
        .times(1)
        .returning(|_, _, _| Err(StoreError::Request("timeout".to_string())));

    let service = ChatService::new(Arc::new(store));
    let result = service.send_message("t1", "admin-1", "hello").await;

    assert_matches!(
        result,
        Err(ChatError::SummaryNotUpdated { message_id, stale_last_message, reason })
            if message_id == "m-new"
                && stale_last_message.as_deref() == Some("Hello")
                && reason.contains("timeout")
    );
}

#[tokio::test]
async fn test_mark_read_clears_admin_flag() {
    let store = seeded();
    let service = ChatService::new(Arc::new(store.clone()));

    service.mark_read("t1").await.unwrap();

    let threads = service.list_threads().await.unwrap();
    assert_eq!(unread_count(&threads), 0);
    assert_matches!(service.mark_read("missing").await, Err(ChatError::ThreadNotFound(_)));
}

#[tokio::test]
async fn test_live_messages_see_new_sends() {
    let store = seeded();
    let service = ChatService::new(Arc::new(store.clone()));

    let mut live = service.live_messages("t1").await.unwrap();
    assert_eq!(live.loaded().await.unwrap().len(), 2);

    service.send_message("t1", "admin-1", "Third").await.unwrap();
    let messages = live.changed().await.unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[2].text, "Third");
}
