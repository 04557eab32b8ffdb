use serde::{Deserialize, Serialize};

use shared_models::Timestamp;

/// Conversation with one patient. The summary fields mirror the newest
/// message and are maintained by the sender.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatThread {
    pub id: String,
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub patient_email: Option<String>,
    pub last_message: Option<String>,
    pub last_message_time: Option<Timestamp>,
    #[serde(default)]
    pub unread_by_admin: bool,
    #[serde(default)]
    pub unread_by_patient: bool,
}

impl ChatThread {
    pub fn patient_label(&self) -> &str {
        self.patient_name
            .as_deref()
            .or(self.patient_email.as_deref())
            .unwrap_or("N/A")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    pub text: String,
    pub sender_id: String,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

/// Both halves of a send: the appended message and the thread as updated.
#[derive(Debug, Clone, Serialize)]
pub struct SentMessage {
    pub message: ChatMessage,
    pub thread: ChatThread,
}
