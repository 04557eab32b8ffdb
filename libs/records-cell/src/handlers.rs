use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_database::SupabaseStore;
use shared_models::error::AppError;

use crate::models::{InvoiceQuery, InvoiceSummary, ServiceQuery, UserSearchQuery};
use crate::services::RecordsService;

fn records_service(config: &AppConfig, token: &str) -> RecordsService {
    RecordsService::new(Arc::new(SupabaseStore::new(config, token)))
}

#[axum::debug_handler]
pub async fn search_users(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<UserSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let users = records_service(&config, auth.token()).search_users(query).await?;

    Ok(Json(json!({
        "users": users,
        "total": users.len()
    })))
}

#[axum::debug_handler]
pub async fn get_user(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let user = records_service(&config, auth.token()).get_user(&user_id).await?;
    Ok(Json(json!(user)))
}

#[axum::debug_handler]
pub async fn get_user_documents(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let documents = records_service(&config, auth.token())
        .documents_for_user(&user_id)
        .await?;

    Ok(Json(json!({ "documents": documents })))
}

#[axum::debug_handler]
pub async fn get_user_invoices(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let invoices = records_service(&config, auth.token())
        .invoices_for_user(&user_id)
        .await?;

    Ok(Json(json!({
        "summary": InvoiceSummary::from_invoices(&invoices),
        "invoices": invoices
    })))
}

#[axum::debug_handler]
pub async fn list_invoices(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<InvoiceQuery>,
) -> Result<Json<Value>, AppError> {
    let invoices = records_service(&config, auth.token())
        .list_invoices(query.status)
        .await?;

    Ok(Json(json!({ "invoices": invoices })))
}

#[axum::debug_handler]
pub async fn get_invoice_summary(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let summary = records_service(&config, auth.token()).invoice_summary().await?;
    Ok(Json(json!(summary)))
}

#[axum::debug_handler]
pub async fn list_services(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<ServiceQuery>,
) -> Result<Json<Value>, AppError> {
    let services = records_service(&config, auth.token())
        .list_services(query.active_only)
        .await?;

    Ok(Json(json!({ "services": services })))
}

#[axum::debug_handler]
pub async fn list_schedules(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let schedules = records_service(&config, auth.token()).list_schedules().await?;
    Ok(Json(json!({ "schedules": schedules })))
}
