use std::fmt;

use serde::{Deserialize, Serialize};

use shared_database::StoreError;
use shared_models::error::AppError;
use shared_models::Timestamp;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppUser {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub active: Option<bool>,
    pub created_at: Option<Timestamp>,
}

impl AppUser {
    /// Accounts without an explicit flag count as active.
    pub fn is_active(&self) -> bool {
        self.active.unwrap_or(true)
    }

    pub fn display_label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("N/A")
    }

    /// `needle` must already be lowercase.
    pub fn matches_search(&self, needle: &str) -> bool {
        [&self.display_name, &self.email]
            .into_iter()
            .flatten()
            .any(|haystack| haystack.to_lowercase().contains(needle))
    }
}

/// File uploaded against a user (referral letter, scan, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientDocument {
    pub id: String,
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub kind: Option<String>,
    pub url: Option<String>,
    pub uploaded_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    pub id: String,
    pub invoice_number: Option<String>,
    pub user_id: Option<String>,
    pub patient_name: Option<String>,
    #[serde(default)]
    pub amount: f64,
    pub status: InvoiceStatus,
    pub issued_at: Option<Timestamp>,
    pub due_date: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Paid,
    Pending,
    Overdue,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceStatus::Paid => write!(f, "paid"),
            InvoiceStatus::Pending => write!(f, "pending"),
            InvoiceStatus::Overdue => write!(f, "overdue"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct StatusTotal {
    pub count: usize,
    pub total: f64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct InvoiceSummary {
    pub paid: StatusTotal,
    pub pending: StatusTotal,
    pub overdue: StatusTotal,
}

impl InvoiceSummary {
    pub fn from_invoices(invoices: &[Invoice]) -> Self {
        let mut summary = Self::default();
        for invoice in invoices {
            let bucket = match invoice.status {
                InvoiceStatus::Paid => &mut summary.paid,
                InvoiceStatus::Pending => &mut summary.pending,
                InvoiceStatus::Overdue => &mut summary.overdue,
            };
            bucket.count += 1;
            bucket.total += invoice.amount;
        }
        summary
    }
}

/// A bookable treatment in the price list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClinicService {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    #[serde(default)]
    pub price: f64,
    /// Minutes.
    pub duration: Option<u32>,
    pub active: Option<bool>,
}

impl ClinicService {
    pub fn is_active(&self) -> bool {
        self.active.unwrap_or(true)
    }
}

/// Weekly opening hours; `day_of_week` counts from Sunday = 0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    pub id: String,
    pub day_of_week: u8,
    pub start_time: String,
    pub end_time: String,
    pub slot_minutes: Option<u32>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserSearchQuery {
    pub search: Option<String>,
    pub role: Option<String>,
    pub active: Option<bool>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceQuery {
    pub status: Option<InvoiceStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceQuery {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RecordsError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Malformed {collection} record {id}: {reason}")]
    Malformed {
        collection: &'static str,
        id: String,
        reason: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RecordsError> for AppError {
    fn from(err: RecordsError) -> Self {
        match &err {
            RecordsError::UserNotFound(_) => AppError::NotFound(err.to_string()),
            RecordsError::Store(StoreError::PermissionDenied(msg)) => AppError::Auth(msg.clone()),
            RecordsError::Malformed { .. } | RecordsError::Store(_) => AppError::Database(err.to_string()),
        }
    }
}
