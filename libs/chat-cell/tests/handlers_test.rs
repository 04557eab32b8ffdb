use std::sync::Arc;

use assert_matches::assert_matches;
use axum::extract::{Extension, Path, State};
use axum::Json;
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chat_cell::handlers::*;
use chat_cell::models::SendMessageRequest;
use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

fn create_auth_header(token: &str) -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer(token).unwrap())
}

fn state_for(server: &MockServer) -> State<Arc<AppConfig>> {
    State(Arc::new(TestConfig::with_url(&server.uri())))
}

#[tokio::test]
async fn test_list_threads_counts_unread() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/chats"))
        .and(query_param("order", "last_message_time.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::chat_thread_row("t1", "Jane Doe", true),
            MockSupabaseResponses::chat_thread_row("t2", "John Smith", true),
            MockSupabaseResponses::chat_thread_row("t3", "Ann Lee", false)
        ])))
        .mount(&server)
        .await;

    let Json(body) = list_threads(state_for(&server), create_auth_header("token")).await.unwrap();

    assert_eq!(body["unread"], json!(2));
    assert_eq!(body["total"], json!(3));
}

#[tokio::test]
async fn test_send_message_posts_then_patches_thread() {
    let server = MockServer::start().await;
    let operator = TestUser::staff("desk@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/chats"))
        .and(query_param("id", "eq.t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::chat_thread_row("t1", "Jane Doe", true)
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/messages"))
        .and(body_partial_json(json!({ "thread_id": "t1", "text": "Hi Jane", "sender_id": operator.id })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::message_row("m9", "t1", "Hi Jane", "2024-06-01T11:00:00Z")
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/chats"))
        .and(query_param("id", "eq.t1"))
        .and(body_partial_json(json!({
            "last_message": "Hi Jane",
            "unread_by_admin": false,
            "unread_by_patient": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "t1" }])))
        .expect(1)
        .mount(&server)
        .await;

    let Json(body) = send_message(
        state_for(&server),
        create_auth_header("token"),
        Extension(operator.to_user()),
        Path("t1".to_string()),
        Json(SendMessageRequest { text: "Hi Jane".to_string() }),
    )
    .await
    .unwrap();

    assert_eq!(body["message"]["id"], json!("m9"));
    assert_eq!(body["thread"]["unread_by_patient"], json!(true));
}

#[tokio::test]
async fn test_empty_message_is_a_validation_error() {
    let server = MockServer::start().await;

    let result = send_message(
        state_for(&server),
        create_auth_header("token"),
        Extension(TestUser::staff("desk@example.com").to_user()),
        Path("t1".to_string()),
        Json(SendMessageRequest { text: "   ".to_string() }),
    )
    .await;

    assert_matches!(result, Err(AppError::ValidationError(_)));
}

#[tokio::test]
async fn test_partial_send_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/chats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::chat_thread_row("t1", "Jane Doe", true)
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/messages"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{ "id": "m9" }])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(500).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let result = send_message(
        state_for(&server),
        create_auth_header("token"),
        Extension(TestUser::staff("desk@example.com").to_user()),
        Path("t1".to_string()),
        Json(SendMessageRequest { text: "Hi".to_string() }),
    )
    .await;

    assert_matches!(result, Err(AppError::Database(msg)) if msg.contains("m9"));
}
