use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_config::AppConfig;
use shared_utils::extractor::{auth_middleware, staff_middleware};

use crate::handlers::*;

pub fn records_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/users", get(search_users))
        .route("/users/{id}", get(get_user))
        .route("/users/{id}/documents", get(get_user_documents))
        .route("/users/{id}/invoices", get(get_user_invoices))
        .route("/invoices", get(list_invoices))
        .route("/invoices/summary", get(get_invoice_summary))
        .route("/services", get(list_services))
        .route("/schedules", get(list_schedules))
        .layer(middleware::from_fn(staff_middleware))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
