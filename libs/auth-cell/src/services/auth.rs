use chrono::Duration;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};
use shared_models::Timestamp;

use crate::models::{AuthError, GoTrueUser, Session, SessionUser, TokenGrant};

/// Email/password sessions against Supabase GoTrue.
pub struct AuthService {
    supabase: SupabaseClient,
}

fn provider_error(err: anyhow::Error) -> AuthError {
    AuthError::Provider(err.to_string())
}

/// A rejected token means the session is gone.
fn session_error(err: anyhow::Error) -> AuthError {
    if matches!(err.downcast_ref::<SupabaseError>(), Some(SupabaseError::Unauthorized(_))) {
        AuthError::NotSignedIn
    } else {
        provider_error(err)
    }
}

impl AuthService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        debug!("Signing in {}", email);

        let grant: TokenGrant = self
            .supabase
            .request(
                Method::POST,
                "/auth/v1/token?grant_type=password",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await
            .map_err(|e| {
                // GoTrue answers bad credentials with 400 invalid_grant
                let rejected = matches!(
                    e.downcast_ref::<SupabaseError>(),
                    Some(SupabaseError::Api { status: 400, .. }) | Some(SupabaseError::Unauthorized(_))
                );
                if rejected {
                    warn!("Rejected sign-in for {}", email);
                    AuthError::InvalidCredentials
                } else {
                    provider_error(e)
                }
            })?;

        let expires_at = grant
            .expires_in
            .map(|seconds| Timestamp::from_datetime(Timestamp::now().as_datetime() + Duration::seconds(seconds)));
        let user = SessionUser::from(grant.user);
        info!("Signed in {}", user.id);

        Ok(Session {
            user,
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at,
        })
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        self.supabase
            .request_no_content(Method::POST, "/auth/v1/logout", Some(access_token), None)
            .await
            .map_err(provider_error)?;

        info!("Signed out");
        Ok(())
    }

    /// Asks GoTrue to email a reset link. Unknown addresses are not revealed.
    pub async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        self.supabase
            .request_no_content(Method::POST, "/auth/v1/recover", None, Some(json!({ "email": email })))
            .await
            .map_err(provider_error)?;

        debug!("Password reset requested for {}", email);
        Ok(())
    }

    pub async fn current_user(&self, access_token: &str) -> Result<SessionUser, AuthError> {
        let user: GoTrueUser = self
            .supabase
            .request(Method::GET, "/auth/v1/user", Some(access_token), None)
            .await
            .map_err(session_error)?;

        Ok(user.into())
    }

    pub async fn update_display_name(
        &self,
        access_token: &str,
        display_name: &str,
    ) -> Result<SessionUser, AuthError> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(AuthError::EmptyDisplayName);
        }

        let user: GoTrueUser = self
            .supabase
            .request(
                Method::PUT,
                "/auth/v1/user",
                Some(access_token),
                Some(json!({ "data": { "display_name": display_name } })),
            )
            .await
            .map_err(session_error)?;

        info!("Display name updated for {}", user.id);
        Ok(user.into())
    }
}
