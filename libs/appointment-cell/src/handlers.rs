// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    response::IntoResponse,
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use futures::StreamExt;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use shared_config::AppConfig;
use shared_database::{Direction, DocumentStore, SupabaseStore};
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::sse::{snapshot_events, Shared};

use crate::models::{
    AppointmentError, ApproveAppointmentRequest, ConfirmActionRequest, DeclineAppointmentRequest,
};
use crate::router::AppointmentState;
use crate::services::calendar::CalendarIndex;
use crate::services::feed::{fetch_appointment, fetch_appointments, AppointmentDashboard};
use crate::services::lifecycle::{AppointmentLifecycleController, AppointmentLifecycleService, LifecycleOutcome};
use crate::services::operator::PreAnswered;
use crate::services::pricing::RefundQuote;
use crate::services::views::{build_dashboard, compute_stats, DashboardQuery, SortState, StatusView};

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    pub view: Option<StatusView>,
    pub search: Option<String>,
    pub sort: Option<String>,
    /// `asc` or `desc`; ascending when absent.
    pub direction: Option<String>,
}

impl DashboardParams {
    pub fn into_query(self) -> Result<DashboardQuery, AppError> {
        let sort = match self.sort {
            Some(field) => {
                let direction = parse_direction(self.direction.as_deref())?;
                Some(SortState::new(&field, direction)?)
            }
            None => None,
        };

        Ok(DashboardQuery {
            view: self.view.unwrap_or_default(),
            search: self.search.unwrap_or_default(),
            sort,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct MonthParams {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Deserialize)]
pub struct AgendaParams {
    pub year: i32,
    pub month: u32,
    pub date: NaiveDate,
}

fn parse_direction(raw: Option<&str>) -> Result<Direction, AppError> {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        None | Some("asc") | Some("ascending") => Ok(Direction::Ascending),
        Some("desc") | Some("descending") => Ok(Direction::Descending),
        Some(other) => Err(AppError::BadRequest(format!("Unknown sort direction '{}'", other))),
    }
}

fn store_for(state: &AppConfig, token: &str) -> Arc<dyn DocumentStore> {
    Arc::new(SupabaseStore::new(state, token))
}

fn outcome_response(action: &str, outcome: LifecycleOutcome) -> Json<Value> {
    match outcome {
        LifecycleOutcome::Applied(appointment) => Json(json!({
            "success": true,
            "applied": true,
            "appointment": appointment,
            "message": format!("Appointment {} successfully", action)
        })),
        LifecycleOutcome::Aborted => Json(json!({
            "success": false,
            "applied": false,
            "message": "Action cancelled by operator"
        })),
    }
}

// ==============================================================================
// DASHBOARD HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<Value>, AppError> {
    let query = params.into_query()?;
    let store = store_for(&state, auth.token());

    let appointments = fetch_appointments(store.as_ref())
        .await
        .map_err(AppointmentError::from)?;
    let view = build_dashboard(&appointments, &query);

    Ok(Json(json!({
        "appointments": view.appointments,
        "stats": view.stats,
        "matching": view.matching,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment_stats(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let store = store_for(&state, auth.token());
    let appointments = fetch_appointments(store.as_ref())
        .await
        .map_err(AppointmentError::from)?;

    Ok(Json(json!(compute_stats(&appointments))))
}

#[axum::debug_handler]
pub async fn get_calendar_month(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(params): Query<MonthParams>,
) -> Result<Json<Value>, AppError> {
    let store = store_for(&state, auth.token());
    let appointments = fetch_appointments(store.as_ref())
        .await
        .map_err(AppointmentError::from)?;

    let grid = CalendarIndex::build(&appointments).month(params.year, params.month)?;
    Ok(Json(json!(grid)))
}

#[axum::debug_handler]
pub async fn get_calendar_agenda(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(params): Query<AgendaParams>,
) -> Result<Json<Value>, AppError> {
    let store = store_for(&state, auth.token());
    let appointments = fetch_appointments(store.as_ref())
        .await
        .map_err(AppointmentError::from)?;

    let index = CalendarIndex::build(&appointments);
    let grid = index.month(params.year, params.month)?;
    let agenda = index.agenda(&grid, params.date).ok_or_else(|| {
        AppError::BadRequest(format!(
            "{} is not a day of {}-{:02}",
            params.date, params.year, params.month
        ))
    })?;

    Ok(Json(json!(agenda)))
}

/// Server-sent events carrying a fresh dashboard view after every change.
pub async fn stream_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(params): Query<DashboardParams>,
) -> Result<impl IntoResponse, AppError> {
    let query = params.into_query()?;
    let store = store_for(&state, auth.token());

    let dashboard = AppointmentDashboard::open(store.as_ref())
        .await
        .map_err(AppointmentError::from)?;
    info!("Appointment stream opened for {}", user.id);

    let views = dashboard.into_views(query).map(Shared);

    Ok(snapshot_events("appointments", views))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let store = store_for(&state, auth.token());
    let appointment = fetch_appointment(store.as_ref(), &appointment_id).await?;

    let actions = AppointmentLifecycleService::new().available_actions(&appointment);
    let refund_quote = appointment
        .is_refundable()
        .then(|| RefundQuote::for_appointment(&appointment));

    Ok(Json(json!({
        "appointment": appointment,
        "actions": actions,
        "refund_quote": refund_quote
    })))
}

// ==============================================================================
// LIFECYCLE HANDLERS
// ==============================================================================

#[axum::debug_handler(state = AppointmentState)]
pub async fn approve_appointment(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    Json(request): Json<ApproveAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    info!("Operator {} approving appointment {}", user.id, appointment_id);

    let controller = AppointmentLifecycleController::with_approval_flag(
        store_for(&state.config, auth.token()),
        Arc::new(PreAnswered::default()),
        state.approvals.for_operator(&user.id),
    );
    let outcome = controller.approve(&appointment_id, request.admin_notes).await?;

    Ok(outcome_response("approved", outcome))
}

#[axum::debug_handler(state = AppointmentState)]
pub async fn decline_appointment(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    Json(request): Json<DeclineAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    info!("Operator {} declining appointment {}", user.id, appointment_id);

    let controller = AppointmentLifecycleController::with_approval_flag(
        store_for(&state.config, auth.token()),
        Arc::new(PreAnswered::with_reason(request.reason)),
        state.approvals.for_operator(&user.id),
    );
    let outcome = controller.decline(&appointment_id, request.admin_notes).await?;

    Ok(outcome_response("declined", outcome))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    Json(request): Json<ConfirmActionRequest>,
) -> Result<Json<Value>, AppError> {
    info!("Operator {} completing appointment {}", user.id, appointment_id);

    let controller = AppointmentLifecycleController::new(
        store_for(&state, auth.token()),
        Arc::new(PreAnswered::new(None, request.confirmed)),
    );
    let outcome = controller.complete(&appointment_id).await?;

    Ok(outcome_response("completed", outcome))
}

#[axum::debug_handler]
pub async fn get_refund_quote(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let store = store_for(&state, auth.token());
    let appointment = fetch_appointment(store.as_ref(), &appointment_id).await?;
    if !appointment.is_refundable() {
        return Err(AppointmentError::NotRefundable(appointment.status.to_string()).into());
    }

    let quote = RefundQuote::for_appointment(&appointment);
    Ok(Json(json!({
        "quote": quote,
        "message": quote.confirmation_message(appointment.patient_label())
    })))
}

#[axum::debug_handler]
pub async fn refund_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    Json(request): Json<ConfirmActionRequest>,
) -> Result<Json<Value>, AppError> {
    info!("Operator {} refunding appointment {}", user.id, appointment_id);

    let controller = AppointmentLifecycleController::new(
        store_for(&state, auth.token()),
        Arc::new(PreAnswered::new(None, request.confirmed)),
    );
    let outcome = controller.refund(&appointment_id).await?;

    Ok(outcome_response("refunded", outcome))
}
