use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware,
    routing::get,
    Extension, Router,
};
use tower::ServiceExt;

use shared_models::auth::User;
use shared_utils::extractor::{auth_middleware, bearer_token, staff_middleware};
use shared_utils::jwt::{validate_token, TokenError};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

const SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

#[test]
fn test_expired_token_is_rejected() {
    let user = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_expired_token(&user, SECRET);

    assert_eq!(validate_token(&token, SECRET).unwrap_err(), TokenError::Expired);
}

#[test]
fn test_wrong_signature_is_rejected() {
    let user = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_invalid_signature_token(&user);

    assert_eq!(validate_token(&token, SECRET).unwrap_err(), TokenError::BadSignature);
}

#[test]
fn test_malformed_and_unconfigured() {
    assert_matches!(validate_token("only.two", SECRET), Err(TokenError::Malformed));
    assert_matches!(
        validate_token(&JwtTestUtils::create_malformed_token(), ""),
        Err(TokenError::MissingSecret)
    );
}

#[test]
fn test_bearer_token_parsing() {
    assert_eq!(bearer_token(Some("Bearer abc")).unwrap(), "abc");
    assert!(bearer_token(Some("Basic abc")).is_err());
    assert!(bearer_token(Some("Bearer ")).is_err());
    assert!(bearer_token(None).is_err());
}

fn staff_router() -> Router {
    let config = TestConfig::default().to_arc();
    Router::new()
        .route("/whoami", get(|Extension(user): Extension<User>| async move { user.id }))
        .layer(middleware::from_fn(staff_middleware))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
}

async fn status_for(user: &TestUser) -> StatusCode {
    let token = JwtTestUtils::create_test_token(user, SECRET, Some(1));
    let response = staff_router()
        .oneshot(
            Request::builder()
                .uri("/whoami")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    response.status()
}

#[tokio::test]
async fn test_staff_routes_accept_admin_and_staff() {
    assert_eq!(status_for(&TestUser::admin("a@example.com")).await, StatusCode::OK);
    assert_eq!(status_for(&TestUser::staff("s@example.com")).await, StatusCode::OK);
}

#[tokio::test]
async fn test_staff_routes_reject_patients() {
    assert_eq!(status_for(&TestUser::patient("p@example.com")).await, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_missing_header_is_unauthorized() {
    let response = staff_router()
        .oneshot(Request::builder().uri("/whoami").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
