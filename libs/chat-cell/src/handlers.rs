use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    response::IntoResponse,
    Json,
};
use axum_extra::TypedHeader;
use futures::StreamExt;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::info;

use shared_config::AppConfig;
use shared_database::SupabaseStore;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::sse::{snapshot_events, Shared};

use crate::models::SendMessageRequest;
use crate::services::chat::{unread_count, ChatService};

fn chat_service(state: &AppConfig, token: &str) -> ChatService {
    ChatService::new(Arc::new(SupabaseStore::new(state, token)))
}

#[axum::debug_handler]
pub async fn list_threads(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let threads = chat_service(&state, auth.token()).list_threads().await?;

    Ok(Json(json!({
        "unread": unread_count(&threads),
        "total": threads.len(),
        "threads": threads
    })))
}

#[axum::debug_handler]
pub async fn get_unread_count(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let threads = chat_service(&state, auth.token()).list_threads().await?;
    Ok(Json(json!({ "unread": unread_count(&threads) })))
}

pub async fn stream_threads(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, AppError> {
    let live = chat_service(&state, auth.token()).live_threads().await?;
    info!("Chat thread stream opened for {}", user.id);

    let snapshots = live.into_stream().map(|threads| {
        json!({
            "unread": unread_count(&threads),
            "threads": &*threads
        })
    });

    Ok(snapshot_events("threads", snapshots))
}

#[axum::debug_handler]
pub async fn get_thread(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(thread_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = chat_service(&state, auth.token());
    let thread = service.get_thread(&thread_id).await?;
    let messages = service.list_messages(&thread_id).await?;

    Ok(Json(json!({
        "thread": thread,
        "messages": messages
    })))
}

pub async fn stream_messages(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(thread_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let live = chat_service(&state, auth.token()).live_messages(&thread_id).await?;

    let snapshots = live.into_stream().map(Shared);

    Ok(snapshot_events("messages", snapshots))
}

#[axum::debug_handler]
pub async fn send_message(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(thread_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<Value>, AppError> {
    let sent = chat_service(&state, auth.token())
        .send_message(&thread_id, &user.id, &request.text)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": sent.message,
        "thread": sent.thread
    })))
}

#[axum::debug_handler]
pub async fn mark_thread_read(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(thread_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    chat_service(&state, auth.token()).mark_read(&thread_id).await?;
    Ok(Json(json!({ "success": true })))
}
