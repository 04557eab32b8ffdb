use axum::{
    extract::{Extension, State},
    http::header,
    response::IntoResponse,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{PasswordResetRequest, SetThemeRequest, SignInRequest, UpdateDisplayNameRequest};
use crate::router::AuthState;
use crate::services::{export_profile, AuthService};

// ==============================================================================
// SESSION HANDLERS
// ==============================================================================

#[axum::debug_handler(state = AuthState)]
pub async fn sign_in(
    State(state): State<AuthState>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<Value>, AppError> {
    let session = AuthService::new(&state.config)
        .sign_in(&request.email, &request.password)
        .await?;

    let response = json!({
        "access_token": session.access_token,
        "refresh_token": session.refresh_token,
        "expires_at": session.expires_at,
        "user": session.user
    });
    let user_id = session.user.id.clone();
    state.store.set_session(&user_id, Some(session));

    Ok(Json(response))
}

#[axum::debug_handler(state = AuthState)]
pub async fn sign_out(
    State(state): State<AuthState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    AuthService::new(&state.config).sign_out(auth.token()).await?;

    if state.store.set_session(&user.id, None) {
        info!("Operator {} signed out", user.id);
    }

    Ok(Json(json!({
        "success": true,
        "message": "Signed out"
    })))
}

#[axum::debug_handler(state = AuthState)]
pub async fn request_password_reset(
    State(state): State<AuthState>,
    Json(request): Json<PasswordResetRequest>,
) -> Result<Json<Value>, AppError> {
    AuthService::new(&state.config)
        .send_password_reset(&request.email)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "If an account exists for that address, a reset link has been sent"
    })))
}

// ==============================================================================
// PROFILE HANDLERS
// ==============================================================================

#[axum::debug_handler(state = AuthState)]
pub async fn get_profile(
    State(state): State<AuthState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let profile = AuthService::new(&state.config).current_user(auth.token()).await?;
    Ok(Json(json!(profile)))
}

#[axum::debug_handler(state = AuthState)]
pub async fn update_display_name(
    State(state): State<AuthState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<UpdateDisplayNameRequest>,
) -> Result<Json<Value>, AppError> {
    let profile = AuthService::new(&state.config)
        .update_display_name(auth.token(), &request.display_name)
        .await?;

    if let Some(mut session) = state.store.session(&profile.id) {
        session.user = profile.clone();
        state.store.set_session(&profile.id, Some(session));
    }

    Ok(Json(json!({
        "success": true,
        "profile": profile
    })))
}

/// Profile as a JSON file download.
pub async fn export_profile_file(
    State(state): State<AuthState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<impl IntoResponse, AppError> {
    let profile = AuthService::new(&state.config).current_user(auth.token()).await?;
    let export = export_profile(&profile);
    debug!("Exporting profile as {}", export.file_name);

    let disposition = format!("attachment; filename=\"{}\"", export.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Json(export),
    ))
}

// ==============================================================================
// SETTINGS HANDLERS
// ==============================================================================

#[axum::debug_handler(state = AuthState)]
pub async fn get_settings(State(state): State<AuthState>, Extension(user): Extension<User>) -> Json<Value> {
    Json(json!(state.store.snapshot(&user.id)))
}

#[axum::debug_handler(state = AuthState)]
pub async fn set_theme(
    State(state): State<AuthState>,
    Extension(user): Extension<User>,
    Json(request): Json<SetThemeRequest>,
) -> Result<Json<Value>, AppError> {
    if state.store.set_theme(request.theme) {
        state.themes.save(request.theme).await?;
        info!("Operator {} switched theme to {}", user.id, request.theme);
    }

    Ok(Json(json!({ "theme": state.store.theme() })))
}

#[axum::debug_handler(state = AuthState)]
pub async fn toggle_theme(
    State(state): State<AuthState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let theme = state.store.toggle_theme();
    state.themes.save(theme).await?;
    info!("Operator {} toggled theme to {}", user.id, theme);

    Ok(Json(json!({ "theme": theme })))
}
