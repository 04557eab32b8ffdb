// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::{auth_middleware, staff_middleware};

use crate::handlers;
use crate::services::lifecycle::ApprovalLocks;

/// State for the appointment routes. The approval locks outlive single
/// requests so a second approve or decline is refused while one is pending.
#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub approvals: ApprovalLocks,
}

impl AppointmentState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            approvals: ApprovalLocks::new(),
        }
    }
}

impl FromRef<AppointmentState> for Arc<AppConfig> {
    fn from_ref(state: &AppointmentState) -> Self {
        state.config.clone()
    }
}

pub fn appointment_routes(config: Arc<AppConfig>) -> Router {
    let state = AppointmentState::new(config);

    // Staff-only dashboard; every route needs a valid session first
    let staff_routes = Router::new()
        .route("/", get(handlers::list_appointments))
        .route("/stats", get(handlers::get_appointment_stats))
        .route("/stream", get(handlers::stream_appointments))
        .route("/calendar", get(handlers::get_calendar_month))
        .route("/calendar/agenda", get(handlers::get_calendar_agenda))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/approve", post(handlers::approve_appointment))
        .route("/{appointment_id}/decline", post(handlers::decline_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/refund-quote", get(handlers::get_refund_quote))
        .route("/{appointment_id}/refund", post(handlers::refund_appointment))
        .layer(middleware::from_fn(staff_middleware))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new().merge(staff_routes).with_state(state)
}
