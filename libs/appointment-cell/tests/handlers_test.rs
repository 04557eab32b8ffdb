use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::handlers::*;
use appointment_cell::models::{ApproveAppointmentRequest, ConfirmActionRequest, DeclineAppointmentRequest};
use appointment_cell::router::AppointmentState;
use appointment_cell::services::views::StatusView;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

fn create_auth_header(token: &str) -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer(token).unwrap())
}

fn operator() -> Extension<User> {
    Extension(TestUser::staff("desk@example.com").to_user())
}

fn state_for(server: &MockServer) -> State<Arc<AppConfig>> {
    State(Arc::new(TestConfig::with_url(&server.uri())))
}

fn lifecycle_state_for(server: &MockServer) -> AppointmentState {
    AppointmentState::new(Arc::new(TestConfig::with_url(&server.uri())))
}

async fn mount_feed(server: &MockServer) {
    let mut confirmed = MockSupabaseResponses::appointment_row("a2", "confirmed", "paid", 200.0);
    confirmed["confirmed_at"] = json!("2024-06-02T10:00:00Z");
    confirmed["user_name"] = json!("John Smith");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("order", "appointment_date.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row("a1", "pending", "pending", 500.0),
            confirmed,
            { "id": "broken", "status": "pending" }
        ])))
        .mount(server)
        .await;
}

async fn mount_single(server: &MockServer, row: serde_json::Value) {
    let id = row["id"].as_str().unwrap().to_string();
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_list_filters_by_view_and_skips_malformed_rows() {
    let server = MockServer::start().await;
    mount_feed(&server).await;

    let params = DashboardParams {
        view: Some(StatusView::Pending),
        ..DashboardParams::default()
    };
    let Json(body) = list_appointments(state_for(&server), create_auth_header("token"), Query(params))
        .await
        .unwrap();

    assert_eq!(body["total"], json!(2));
    assert_eq!(body["matching"], json!(1));
    assert_eq!(body["appointments"][0]["id"], json!("a1"));
    assert_eq!(body["stats"]["total_revenue"], json!(200.0));
    assert_eq!(body["stats"]["pending_payments"], json!(500.0));
}

#[tokio::test]
async fn test_list_sorts_on_request() {
    let server = MockServer::start().await;
    mount_feed(&server).await;

    let params = DashboardParams {
        sort: Some("amount".to_string()),
        direction: Some("asc".to_string()),
        ..DashboardParams::default()
    };
    let Json(body) = list_appointments(state_for(&server), create_auth_header("token"), Query(params))
        .await
        .unwrap();

    assert_eq!(body["appointments"][0]["id"], json!("a2"));
    assert_eq!(body["appointments"][1]["id"], json!("a1"));
}

#[tokio::test]
async fn test_list_rejects_unknown_sort_column() {
    let server = MockServer::start().await;

    let params = DashboardParams {
        sort: Some("password".to_string()),
        ..DashboardParams::default()
    };
    let result = list_appointments(state_for(&server), create_auth_header("token"), Query(params)).await;

    assert_matches!(result, Err(AppError::ValidationError(_)));
}

#[tokio::test]
async fn test_agenda_for_day_outside_month_is_rejected() {
    let server = MockServer::start().await;
    mount_feed(&server).await;

    let params = AgendaParams {
        year: 2024,
        month: 6,
        date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
    };
    let result = get_calendar_agenda(state_for(&server), create_auth_header("token"), Query(params)).await;
    assert_matches!(result, Err(AppError::BadRequest(_)));

    let params = AgendaParams {
        year: 2024,
        month: 6,
        date: NaiveDate::from_ymd_opt(2024, 6, 14).unwrap(),
    };
    let Json(body) = get_calendar_agenda(state_for(&server), create_auth_header("token"), Query(params))
        .await
        .unwrap();
    assert_eq!(body["appointments"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_detail_lists_actions_and_quote() {
    let server = MockServer::start().await;
    mount_single(&server, MockSupabaseResponses::appointment_row("a1", "confirmed", "paid", 200.0)).await;

    let Json(body) = get_appointment(state_for(&server), create_auth_header("token"), Path("a1".to_string()))
        .await
        .unwrap();

    assert_eq!(body["actions"], json!(["complete", "refund"]));
    assert_eq!(body["refund_quote"]["cancellation_fee"], json!(20.0));
    assert_eq!(body["refund_quote"]["refund_amount"], json!(180.0));
}

#[tokio::test]
async fn test_unknown_appointment_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = get_appointment(state_for(&server), create_auth_header("token"), Path("gone".to_string())).await;

    assert_matches!(result, Err(AppError::NotFound(_)));
}

#[tokio::test]
async fn test_approve_patches_store() {
    let server = MockServer::start().await;
    mount_single(&server, MockSupabaseResponses::appointment_row("a1", "pending", "pending", 500.0)).await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.a1"))
        .and(body_partial_json(json!({ "status": "confirmed", "admin_notes": "ok" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "a1" }])))
        .expect(1)
        .mount(&server)
        .await;

    let Json(body) = approve_appointment(
        State(lifecycle_state_for(&server)),
        create_auth_header("token"),
        operator(),
        Path("a1".to_string()),
        Json(ApproveAppointmentRequest { admin_notes: Some("ok".to_string()) }),
    )
    .await
    .unwrap();

    assert_eq!(body["applied"], json!(true));
    assert_eq!(body["appointment"]["status"], json!("confirmed"));
}

#[tokio::test]
async fn test_decline_without_reason_sends_no_write() {
    let server = MockServer::start().await;
    mount_single(&server, MockSupabaseResponses::appointment_row("a1", "pending", "pending", 500.0)).await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "a1" }])))
        .expect(0)
        .mount(&server)
        .await;

    let Json(body) = decline_appointment(
        State(lifecycle_state_for(&server)),
        create_auth_header("token"),
        operator(),
        Path("a1".to_string()),
        Json(DeclineAppointmentRequest::default()),
    )
    .await
    .unwrap();

    assert_eq!(body["applied"], json!(false));
}

#[tokio::test]
async fn test_second_approval_while_first_pending_is_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.a1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([MockSupabaseResponses::appointment_row("a1", "pending", "pending", 500.0)]))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "a1" }])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.missing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let state = lifecycle_state_for(&server);
    let desk = TestUser::staff("desk@example.com").to_user();
    let first = tokio::spawn(approve_appointment(
        State(state.clone()),
        create_auth_header("token"),
        Extension(desk.clone()),
        Path("a1".to_string()),
        Json(ApproveAppointmentRequest::default()),
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = decline_appointment(
        State(state.clone()),
        create_auth_header("token"),
        Extension(desk),
        Path("a2".to_string()),
        Json(DeclineAppointmentRequest {
            reason: Some("Double booked".to_string()),
            admin_notes: None,
        }),
    )
    .await;
    let error = second.unwrap_err();
    assert_matches!(error, AppError::Conflict(_));
    assert_eq!(error.into_response().status(), StatusCode::CONFLICT);

    // Another operator is not held up by the pending approval
    let other = approve_appointment(
        State(state.clone()),
        create_auth_header("token"),
        Extension(TestUser::admin("owner@example.com").to_user()),
        Path("missing".to_string()),
        Json(ApproveAppointmentRequest::default()),
    )
    .await;
    assert_matches!(other, Err(AppError::NotFound(_)));

    let Json(body) = first.await.unwrap().unwrap();
    assert_eq!(body["applied"], json!(true));
}

#[tokio::test]
async fn test_refund_writes_cancellation() {
    let server = MockServer::start().await;
    mount_single(&server, MockSupabaseResponses::appointment_row("a1", "confirmed", "paid", 200.0)).await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({
            "status": "cancelled",
            "payment_status": "refunded",
            "cancellation_reason": "Refund requested by patient"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "a1" }])))
        .expect(1)
        .mount(&server)
        .await;

    let Json(body) = refund_appointment(
        state_for(&server),
        create_auth_header("token"),
        operator(),
        Path("a1".to_string()),
        Json(ConfirmActionRequest { confirmed: true }),
    )
    .await
    .unwrap();

    assert_eq!(body["appointment"]["payment_status"], json!("refunded"));
}

#[tokio::test]
async fn test_failed_write_surfaces_as_database_error() {
    let server = MockServer::start().await;
    mount_single(&server, MockSupabaseResponses::appointment_row("a1", "confirmed", "paid", 200.0)).await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let result = complete_appointment(
        state_for(&server),
        create_auth_header("token"),
        operator(),
        Path("a1".to_string()),
        Json(ConfirmActionRequest { confirmed: true }),
    )
    .await;

    assert_matches!(result, Err(AppError::Database(msg)) if msg.contains("Failed to update appointment"));
}
