use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            realtime_poll_interval_ms: 100,
            ..AppConfig::default()
        }
    }

    /// Config pointed at a wiremock server.
    pub fn with_url(url: &str) -> AppConfig {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
        .to_app_config()
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "admin".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn staff(email: &str) -> Self {
        Self::new(email, "staff")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: Some(json!({ "display_name": "Test Operator" })),
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Row shapes as PostgREST / GoTrue return them.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn appointment_row(id: &str, status: &str, payment_status: &str, amount: f64) -> Value {
        json!({
            "id": id,
            "user_id": "patient-1",
            "user_name": "Jane Doe",
            "user_email": "jane@example.com",
            "user_phone": "+27 82 000 0000",
            "service_id": "svc-1",
            "service_name": "Physiotherapy",
            "service_category": "Rehab",
            "appointment_date": "2024-06-14T09:00:00Z",
            "time_slot": "09:00",
            "duration": 60,
            "status": status,
            "amount": amount,
            "payment_status": payment_status,
            "payment_method": "card",
            "transaction_id": null,
            "paid_at": null,
            "patient_notes": null,
            "admin_notes": null,
            "cancellation_reason": null,
            "created_at": "2024-06-01T08:00:00Z",
            "updated_at": "2024-06-01T08:00:00Z",
            "confirmed_at": null,
            "cancelled_at": null
        })
    }

    pub fn chat_thread_row(id: &str, patient_name: &str, unread: bool) -> Value {
        json!({
            "id": id,
            "patient_id": format!("patient-{}", id),
            "patient_name": patient_name,
            "patient_email": "patient@example.com",
            "last_message": "Hello",
            "last_message_time": "2024-06-01T10:00:00Z",
            "unread_by_admin": unread,
            "unread_by_patient": false
        })
    }

    pub fn message_row(id: &str, thread_id: &str, text: &str, timestamp: &str) -> Value {
        json!({
            "id": id,
            "thread_id": thread_id,
            "text": text,
            "sender_id": "patient-1",
            "timestamp": timestamp
        })
    }

    pub fn user_row(id: &str, name: &str, email: &str, role: &str, active: bool) -> Value {
        json!({
            "id": id,
            "display_name": name,
            "email": email,
            "role": role,
            "active": active,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn invoice_row(id: &str, status: &str, amount: f64) -> Value {
        json!({
            "id": id,
            "invoice_number": format!("INV-{}", id),
            "user_id": "patient-1",
            "patient_name": "Jane Doe",
            "amount": amount,
            "status": status,
            "issued_at": "2024-05-01T00:00:00Z",
            "due_date": "2024-05-31"
        })
    }

    /// GoTrue `/token?grant_type=password` success body.
    pub fn session_response(user: &TestUser) -> Value {
        json!({
            "access_token": "access-token",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-token",
            "user": {
                "id": user.id,
                "email": user.email,
                "role": "authenticated",
                "app_metadata": { "role": user.role },
                "user_metadata": { "display_name": "Test Operator" },
                "created_at": "2024-01-01T00:00:00Z"
            }
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "error": code,
            "error_description": message
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(!app_config.supabase_jwt_secret.is_empty());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::staff("front-desk@example.com");
        assert_eq!(user.role, "staff");

        let user_model = user.to_user();
        assert_eq!(user_model.email, Some(user.email.clone()));
        assert!(user_model.is_staff());
        assert_eq!(user_model.display_name().as_deref(), Some("Test Operator"));
    }

    #[test]
    fn test_jwt_token_round_trips_through_validation() {
        let user = TestUser::admin("admin@example.com");
        let secret = "test-secret";
        let token = JwtTestUtils::create_test_token(&user, secret, Some(1));

        let validated = crate::jwt::validate_token(&token, secret).unwrap();
        assert_eq!(validated.id, user.id);
        assert_eq!(validated.role.as_deref(), Some("admin"));
    }
}
