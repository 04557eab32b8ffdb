use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;
use shared_models::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

/// The signed-in operator as GoTrue describes them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionUser {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub role: Option<String>,
    pub created_at: Option<Timestamp>,
}

/// Tokens are kept out of serialized snapshots.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Session {
    pub user: SessionUser,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub expires_at: Option<Timestamp>,
}

/// Wire shape of a GoTrue user object.
#[derive(Debug, Clone, Deserialize)]
pub struct GoTrueUser {
    pub id: String,
    pub email: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub created_at: Option<Timestamp>,
}

impl From<GoTrueUser> for SessionUser {
    fn from(user: GoTrueUser) -> Self {
        let text = |value: Option<&serde_json::Value>, key: &str| {
            value
                .and_then(|m| m.get(key))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        Self {
            display_name: text(user.user_metadata.as_ref(), "display_name")
                .or_else(|| text(user.user_metadata.as_ref(), "full_name")),
            role: text(user.app_metadata.as_ref(), "role"),
            id: user.id,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

/// GoTrue `/token?grant_type=password` answer.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub user: GoTrueUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateDisplayNameRequest {
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetThemeRequest {
    pub theme: Theme,
}

/// Downloadable copy of the operator's basic profile.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfileExport {
    pub file_name: String,
    pub exported_at: Timestamp,
    pub profile: SessionUser,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email and password are required")]
    MissingCredentials,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Display name cannot be empty")]
    EmptyDisplayName,

    #[error("Auth provider error: {0}")]
    Provider(String),

    #[error("Could not save preferences: {0}")]
    Preferences(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match &err {
            AuthError::MissingCredentials | AuthError::EmptyDisplayName => {
                AppError::ValidationError(err.to_string())
            }
            AuthError::InvalidCredentials | AuthError::NotSignedIn => AppError::Auth(err.to_string()),
            AuthError::Provider(_) => AppError::ExternalService(err.to_string()),
            AuthError::Preferences(_) => AppError::Internal(err.to_string()),
        }
    }
}
