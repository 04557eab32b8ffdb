use std::sync::Arc;

use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::{AppStore, ThemeStore};

/// State shared by the session and settings routes.
#[derive(Clone)]
pub struct AuthState {
    pub config: Arc<AppConfig>,
    pub store: AppStore,
    pub themes: ThemeStore,
}

impl AuthState {
    pub fn new(config: Arc<AppConfig>, store: AppStore, themes: ThemeStore) -> Self {
        Self { config, store, themes }
    }
}

impl FromRef<AuthState> for Arc<AppConfig> {
    fn from_ref(state: &AuthState) -> Self {
        state.config.clone()
    }
}

pub fn auth_routes(state: AuthState) -> Router {
    let public_routes = Router::new()
        .route("/sign-in", post(handlers::sign_in))
        .route("/password-reset", post(handlers::request_password_reset));

    let protected_routes = Router::new()
        .route("/sign-out", post(handlers::sign_out))
        .route("/profile", get(handlers::get_profile))
        .route("/profile/display-name", put(handlers::update_display_name))
        .route("/profile/export", get(handlers::export_profile_file))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

pub fn settings_routes(state: AuthState) -> Router {
    Router::new()
        .route("/", get(handlers::get_settings))
        .route("/theme", put(handlers::set_theme))
        .route("/theme/toggle", post(handlers::toggle_theme))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
