use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Something the lifecycle controller needs from the person at the desk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperatorRequest {
    /// Free-text answer, e.g. a decline reason.
    Reason { appointment_id: String, prompt: String },
    /// Yes/no before a destructive write.
    Confirm { appointment_id: String, message: String },
    /// Notification that something failed. No answer expected.
    Alert { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OperatorResponse {
    Reason(Option<String>),
    Confirmed(bool),
    Acknowledged,
}

impl OperatorResponse {
    /// The answer a closed or dismissed dialog amounts to.
    pub fn dismissed(request: &OperatorRequest) -> Self {
        match request {
            OperatorRequest::Reason { .. } => OperatorResponse::Reason(None),
            OperatorRequest::Confirm { .. } => OperatorResponse::Confirmed(false),
            OperatorRequest::Alert { .. } => OperatorResponse::Acknowledged,
        }
    }
}

#[async_trait]
pub trait OperatorPrompt: Send + Sync {
    async fn ask(&self, request: OperatorRequest) -> OperatorResponse;

    async fn reason(&self, appointment_id: &str, prompt: &str) -> Option<String> {
        let request = OperatorRequest::Reason {
            appointment_id: appointment_id.to_string(),
            prompt: prompt.to_string(),
        };
        match self.ask(request).await {
            OperatorResponse::Reason(answer) => answer,
            _ => None,
        }
    }

    async fn confirm(&self, appointment_id: &str, message: &str) -> bool {
        let request = OperatorRequest::Confirm {
            appointment_id: appointment_id.to_string(),
            message: message.to_string(),
        };
        matches!(self.ask(request).await, OperatorResponse::Confirmed(true))
    }

    async fn alert(&self, message: &str) {
        self.ask(OperatorRequest::Alert { message: message.to_string() }).await;
    }
}

/// A request in flight to whoever drives the UI, with its reply slot.
#[derive(Debug)]
pub struct OperatorMessage {
    pub request: OperatorRequest,
    reply: oneshot::Sender<OperatorResponse>,
}

impl OperatorMessage {
    pub fn respond(self, response: OperatorResponse) {
        if self.reply.send(response).is_err() {
            debug!("Operator answered a request nobody is waiting for");
        }
    }

    pub fn dismiss(self) {
        let response = OperatorResponse::dismissed(&self.request);
        self.respond(response);
    }
}

/// Prompt that forwards requests over a channel and waits for the answer.
#[derive(Clone)]
pub struct ChannelPrompt {
    sender: mpsc::Sender<OperatorMessage>,
}

impl ChannelPrompt {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<OperatorMessage>) {
        let (sender, receiver) = mpsc::channel(buffer);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl OperatorPrompt for ChannelPrompt {
    async fn ask(&self, request: OperatorRequest) -> OperatorResponse {
        let fallback = OperatorResponse::dismissed(&request);
        let (reply, answer) = oneshot::channel();

        if self.sender.send(OperatorMessage { request, reply }).await.is_err() {
            warn!("Operator channel closed; treating request as dismissed");
            return fallback;
        }

        answer.await.unwrap_or(fallback)
    }
}

/// Prompt whose answers were given up front, as in an HTTP request body.
/// Alerts are logged and kept for the response.
#[derive(Debug, Default)]
pub struct PreAnswered {
    reason: Option<String>,
    confirmed: bool,
    alerts: Mutex<Vec<String>>,
}

impl PreAnswered {
    pub fn new(reason: Option<String>, confirmed: bool) -> Self {
        Self {
            reason,
            confirmed,
            alerts: Mutex::new(Vec::new()),
        }
    }

    pub fn confirmed() -> Self {
        Self::new(None, true)
    }

    pub fn with_reason(reason: Option<String>) -> Self {
        Self::new(reason, false)
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().map(|alerts| alerts.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl OperatorPrompt for PreAnswered {
    async fn ask(&self, request: OperatorRequest) -> OperatorResponse {
        match request {
            OperatorRequest::Reason { .. } => OperatorResponse::Reason(self.reason.clone()),
            OperatorRequest::Confirm { .. } => OperatorResponse::Confirmed(self.confirmed),
            OperatorRequest::Alert { message } => {
                warn!("Operator alert: {}", message);
                if let Ok(mut alerts) = self.alerts.lock() {
                    alerts.push(message);
                }
                OperatorResponse::Acknowledged
            }
        }
    }
}
