use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error, info};

use shared_database::{decode_all, CollectionRef, Direction, DocumentStore, LiveCollection, Query, StoreError};
use shared_models::Timestamp;

use crate::error::ChatError;
use crate::models::{ChatMessage, ChatThread, SentMessage};

pub const CHATS: &str = "chats";
pub const MESSAGES: &str = "messages";

pub fn threads_collection() -> CollectionRef {
    CollectionRef::new(CHATS)
}

/// Messages live under their thread, keyed by `thread_id`.
pub fn messages_collection(thread_id: &str) -> CollectionRef {
    CollectionRef::sub(MESSAGES, "thread_id", thread_id)
}

pub fn threads_query() -> Query {
    Query::new(threads_collection()).order_by("last_message_time", Direction::Descending)
}

pub fn messages_query(thread_id: &str) -> Query {
    Query::new(messages_collection(thread_id)).order_by("timestamp", Direction::Ascending)
}

/// Threads with something the clinic has not read yet.
pub fn unread_count(threads: &[ChatThread]) -> usize {
    threads.iter().filter(|thread| thread.unread_by_admin).count()
}

pub struct ChatService {
    store: Arc<dyn DocumentStore>,
}

impl ChatService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn list_threads(&self) -> Result<Vec<ChatThread>, ChatError> {
        let documents = self.store.list(&threads_query()).await?;
        Ok(decode_all(CHATS, documents))
    }

    pub async fn get_thread(&self, thread_id: &str) -> Result<ChatThread, ChatError> {
        let document = self
            .store
            .get(&threads_collection(), thread_id)
            .await?
            .ok_or_else(|| ChatError::ThreadNotFound(thread_id.to_string()))?;

        document.decode().map_err(|e| ChatError::Malformed {
            id: thread_id.to_string(),
            reason: e.to_string(),
        })
    }

    pub async fn list_messages(&self, thread_id: &str) -> Result<Vec<ChatMessage>, ChatError> {
        let documents = self.store.list(&messages_query(thread_id)).await?;
        Ok(decode_all(MESSAGES, documents))
    }

    pub async fn live_threads(&self) -> Result<LiveCollection<ChatThread>, ChatError> {
        Ok(LiveCollection::open(self.store.as_ref(), threads_query()).await?)
    }

    pub async fn live_messages(&self, thread_id: &str) -> Result<LiveCollection<ChatMessage>, ChatError> {
        Ok(LiveCollection::open(self.store.as_ref(), messages_query(thread_id)).await?)
    }

    /// Appends a message, then points the thread summary at it. The two
    /// writes are independent; when the second fails the message stays.
    pub async fn send_message(
        &self,
        thread_id: &str,
        sender_id: &str,
        text: &str,
    ) -> Result<SentMessage, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let thread = self.get_thread(thread_id).await?;
        let sent_at = Timestamp::now();

        let mut fields = Map::new();
        fields.insert("text".into(), Value::String(text.to_string()));
        fields.insert("sender_id".into(), Value::String(sender_id.to_string()));
        fields.insert("timestamp".into(), Value::String(sent_at.to_rfc3339()));

        let message_id = self.store.add(&messages_collection(thread_id), fields).await?;
        debug!("Appended message {} to thread {}", message_id, thread_id);

        let mut summary = Map::new();
        summary.insert("last_message".into(), Value::String(text.to_string()));
        summary.insert("last_message_time".into(), Value::String(sent_at.to_rfc3339()));
        summary.insert("unread_by_admin".into(), Value::Bool(false));
        summary.insert("unread_by_patient".into(), Value::Bool(true));

        if let Err(e) = self.store.update(&threads_collection(), thread_id, summary).await {
            error!(
                "Message {} sent but thread {} summary update failed: {}",
                message_id, thread_id, e
            );
            return Err(ChatError::SummaryNotUpdated {
                message_id,
                stale_last_message: thread.last_message,
                reason: e.to_string(),
            });
        }

        info!("Message {} sent to {}", message_id, thread.patient_label());
        Ok(SentMessage {
            message: ChatMessage {
                id: message_id,
                thread_id: thread_id.to_string(),
                text: text.to_string(),
                sender_id: sender_id.to_string(),
                timestamp: sent_at,
            },
            thread: ChatThread {
                last_message: Some(text.to_string()),
                last_message_time: Some(sent_at),
                unread_by_admin: false,
                unread_by_patient: true,
                ..thread
            },
        })
    }

    /// Clears the clinic-side unread flag.
    pub async fn mark_read(&self, thread_id: &str) -> Result<(), ChatError> {
        let mut patch = Map::new();
        patch.insert("unread_by_admin".into(), Value::Bool(false));

        self.store
            .update(&threads_collection(), thread_id, patch)
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => ChatError::ThreadNotFound(thread_id.to_string()),
                other => ChatError::Store(other),
            })?;

        debug!("Thread {} marked read", thread_id);
        Ok(())
    }
}
