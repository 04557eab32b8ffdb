use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use auth_cell::{auth_routes, settings_routes, AuthState};
use chat_cell::router::chat_routes;
use records_cell::router::records_routes;
use shared_config::AppConfig;

pub fn create_router(config: Arc<AppConfig>, auth_state: AuthState) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic admin API is running!" }))
        .nest("/auth", auth_routes(auth_state.clone()))
        .nest("/settings", settings_routes(auth_state))
        .nest("/appointments", appointment_routes(config.clone()))
        .nest("/chats", chat_routes(config.clone()))
        .nest("/records", records_routes(config))
}
