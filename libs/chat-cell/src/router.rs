use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::{auth_middleware, staff_middleware};

use crate::handlers;

pub fn chat_routes(state: Arc<AppConfig>) -> Router {
    let staff_routes = Router::new()
        .route("/", get(handlers::list_threads))
        .route("/unread", get(handlers::get_unread_count))
        .route("/stream", get(handlers::stream_threads))
        .route("/{thread_id}", get(handlers::get_thread))
        .route("/{thread_id}/messages", post(handlers::send_message))
        .route("/{thread_id}/messages/stream", get(handlers::stream_messages))
        .route("/{thread_id}/read", post(handlers::mark_thread_read))
        .layer(middleware::from_fn(staff_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(staff_routes).with_state(state)
}
