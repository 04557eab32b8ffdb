// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::StoreError;
use shared_models::error::AppError;
use shared_models::Timestamp;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

/// One booking as stored in the `appointments` collection. Name, email and
/// service fields are denormalized copies kept for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: String,

    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub user_phone: Option<String>,

    pub service_id: Option<String>,
    pub service_name: Option<String>,
    pub service_category: Option<String>,

    pub appointment_date: Timestamp,
    pub time_slot: Option<String>,
    /// Minutes.
    pub duration: Option<u32>,

    pub status: AppointmentStatus,

    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub paid_at: Option<Timestamp>,

    pub patient_notes: Option<String>,
    pub admin_notes: Option<String>,
    pub cancellation_reason: Option<String>,

    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
    pub confirmed_at: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
}

impl Appointment {
    /// Field keys the list view can sort on.
    pub const SORTABLE_FIELDS: &'static [&'static str] = &[
        "id",
        "user_name",
        "user_email",
        "user_phone",
        "service_name",
        "service_category",
        "appointment_date",
        "time_slot",
        "duration",
        "status",
        "amount",
        "payment_status",
        "payment_method",
        "created_at",
        "updated_at",
        "confirmed_at",
        "cancelled_at",
        "paid_at",
    ];

    pub fn date(&self) -> NaiveDate {
        self.appointment_date.date()
    }

    /// Awaiting review: status is pending, or the confirmation stamp is
    /// missing, but never once completed or cancelled.
    pub fn is_awaiting_review(&self) -> bool {
        if matches!(self.status, AppointmentStatus::Completed | AppointmentStatus::Cancelled) {
            return false;
        }
        self.status == AppointmentStatus::Pending || self.confirmed_at.is_none()
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self.status, AppointmentStatus::Confirmed | AppointmentStatus::Paid)
    }

    /// Case-insensitive match on patient name, email and service name.
    /// `needle` must already be lowercase.
    pub fn matches_search(&self, needle: &str) -> bool {
        [&self.user_name, &self.user_email, &self.service_name]
            .into_iter()
            .flatten()
            .any(|haystack| haystack.to_lowercase().contains(needle))
    }

    pub fn is_refundable(&self) -> bool {
        self.payment_status == PaymentStatus::Paid && self.status != AppointmentStatus::Cancelled
    }

    pub fn patient_label(&self) -> &str {
        self.user_name.as_deref().unwrap_or("N/A")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Paid,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Paid => write!(f, "paid"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    #[default]
    Pending,
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Refunded => write!(f, "refunded"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApproveAppointmentRequest {
    pub admin_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeclineAppointmentRequest {
    /// The operator's answer to the reason prompt; absent means dismissed.
    pub reason: Option<String>,
    pub admin_notes: Option<String>,
}

/// Body for actions gated on a yes/no confirmation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfirmActionRequest {
    #[serde(default)]
    pub confirmed: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    Approve,
    Decline,
    Complete,
    Refund,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("Appointment not found: {0}")]
    NotFound(String),

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Appointment is not eligible for a refund: {0}")]
    NotRefundable(String),

    #[error("Another approval is already in progress")]
    ApprovalInProgress,

    #[error("Failed to update appointment: {0}")]
    WriteFailed(String),

    #[error("Invalid calendar month: {year}-{month}")]
    InvalidMonth { year: i32, month: u32 },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Malformed appointment {id}: {reason}")]
    Malformed { id: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match &err {
            AppointmentError::NotFound(_) => AppError::NotFound(err.to_string()),
            AppointmentError::InvalidStatusTransition { .. }
            | AppointmentError::NotRefundable(_)
            | AppointmentError::ApprovalInProgress => AppError::Conflict(err.to_string()),
            AppointmentError::InvalidMonth { .. } | AppointmentError::ValidationError(_) => {
                AppError::ValidationError(err.to_string())
            }
            AppointmentError::Store(StoreError::PermissionDenied(msg)) => AppError::Auth(msg.clone()),
            AppointmentError::Store(StoreError::NotFound { .. }) => AppError::NotFound(err.to_string()),
            AppointmentError::WriteFailed(_)
            | AppointmentError::Malformed { .. }
            | AppointmentError::Store(_) => AppError::Database(err.to_string()),
        }
    }
}
