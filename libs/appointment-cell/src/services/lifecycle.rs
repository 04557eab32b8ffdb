// libs/appointment-cell/src/services/lifecycle.rs
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use shared_database::DocumentStore;
use shared_models::Timestamp;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, LifecycleAction, PaymentStatus};
use crate::services::feed::{appointments_collection, fetch_appointment};
use crate::services::operator::OperatorPrompt;
use crate::services::pricing::RefundQuote;

pub const REFUND_REASON: &str = "Refund requested by patient";

const DECLINE_PROMPT: &str = "Please provide a reason for declining this appointment:";
const COMPLETE_PROMPT: &str = "Mark this appointment as completed?";

/// Status transition table for appointments.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_status_transition(
        &self,
        current_status: &AppointmentStatus,
        new_status: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: *current_status,
                to: *new_status,
            });
        }

        Ok(())
    }

    /// `paid` moves like `confirmed`; `completed` and `cancelled` are terminal.
    pub fn get_valid_transitions(&self, current_status: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![AppointmentStatus::Confirmed, AppointmentStatus::Cancelled],
            AppointmentStatus::Confirmed | AppointmentStatus::Paid => {
                vec![AppointmentStatus::Completed, AppointmentStatus::Cancelled]
            }
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => vec![],
        }
    }

    /// Actions the dashboard offers for an appointment in its current state.
    pub fn available_actions(&self, appointment: &Appointment) -> Vec<LifecycleAction> {
        let mut actions = Vec::new();

        match appointment.status {
            AppointmentStatus::Pending => {
                actions.push(LifecycleAction::Approve);
                actions.push(LifecycleAction::Decline);
            }
            AppointmentStatus::Confirmed | AppointmentStatus::Paid | AppointmentStatus::Completed => {
                actions.push(LifecycleAction::Complete);
            }
            AppointmentStatus::Cancelled => {}
        }

        if appointment.is_refundable() {
            actions.push(LifecycleAction::Refund);
        }

        actions
    }
}

/// What happened to a lifecycle request.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleOutcome {
    /// The write went through; carries the record as written.
    Applied(Appointment),
    /// The operator dismissed or declined the prompt. Nothing was written.
    Aborted,
}

/// Applies operator actions to appointments. Approve and decline share one
/// in-flight flag, which callers may hand in to span several controllers.
pub struct AppointmentLifecycleController {
    store: Arc<dyn DocumentStore>,
    prompt: Arc<dyn OperatorPrompt>,
    rules: AppointmentLifecycleService,
    approval_in_flight: Arc<AtomicBool>,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One approval flag per operator, kept for the lifetime of the router.
#[derive(Debug, Clone, Default)]
pub struct ApprovalLocks {
    flags: Arc<Mutex<HashMap<String, Arc<AtomicBool>>>>,
}

impl ApprovalLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_operator(&self, operator_id: &str) -> Arc<AtomicBool> {
        let mut flags = self.flags.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        flags
            .entry(operator_id.to_string())
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone()
    }
}

impl AppointmentLifecycleController {
    pub fn new(store: Arc<dyn DocumentStore>, prompt: Arc<dyn OperatorPrompt>) -> Self {
        Self::with_approval_flag(store, prompt, Arc::new(AtomicBool::new(false)))
    }

    pub fn with_approval_flag(
        store: Arc<dyn DocumentStore>,
        prompt: Arc<dyn OperatorPrompt>,
        approval_in_flight: Arc<AtomicBool>,
    ) -> Self {
        Self {
            store,
            prompt,
            rules: AppointmentLifecycleService::new(),
            approval_in_flight,
        }
    }

    pub fn rules(&self) -> &AppointmentLifecycleService {
        &self.rules
    }

    pub fn is_approval_in_flight(&self) -> bool {
        self.approval_in_flight.load(Ordering::Acquire)
    }

    fn begin_approval(&self) -> Result<InFlight<'_>, AppointmentError> {
        self.approval_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AppointmentError::ApprovalInProgress)?;
        Ok(InFlight(self.approval_in_flight.as_ref()))
    }

    /// pending → confirmed. Stamps `confirmed_at`.
    pub async fn approve(
        &self,
        appointment_id: &str,
        admin_notes: Option<String>,
    ) -> Result<LifecycleOutcome, AppointmentError> {
        let _guard = self.begin_approval()?;
        info!("Approving appointment {}", appointment_id);

        let appointment = fetch_appointment(self.store.as_ref(), appointment_id).await?;
        self.rules
            .validate_status_transition(&appointment.status, &AppointmentStatus::Confirmed)?;

        let now = Timestamp::now();
        let mut patch = Map::new();
        patch.insert("status".into(), status_value(AppointmentStatus::Confirmed));
        patch.insert("confirmed_at".into(), timestamp_value(now));
        patch.insert("updated_at".into(), timestamp_value(now));
        insert_notes(&mut patch, admin_notes);

        self.write(appointment, patch).await.map(LifecycleOutcome::Applied)
    }

    /// pending → cancelled, with a reason asked from the operator. A blank or
    /// dismissed reason aborts.
    pub async fn decline(
        &self,
        appointment_id: &str,
        admin_notes: Option<String>,
    ) -> Result<LifecycleOutcome, AppointmentError> {
        let _guard = self.begin_approval()?;
        info!("Declining appointment {}", appointment_id);

        let appointment = fetch_appointment(self.store.as_ref(), appointment_id).await?;
        self.rules
            .validate_status_transition(&appointment.status, &AppointmentStatus::Cancelled)?;

        let reason = self
            .prompt
            .reason(appointment_id, DECLINE_PROMPT)
            .await
            .map(|reason| reason.trim().to_string())
            .filter(|reason| !reason.is_empty());
        let Some(reason) = reason else {
            debug!("Decline of {} aborted without a reason", appointment_id);
            return Ok(LifecycleOutcome::Aborted);
        };

        let now = Timestamp::now();
        let mut patch = Map::new();
        patch.insert("status".into(), status_value(AppointmentStatus::Cancelled));
        patch.insert("cancelled_at".into(), timestamp_value(now));
        patch.insert("cancellation_reason".into(), Value::String(reason));
        patch.insert("updated_at".into(), timestamp_value(now));
        insert_notes(&mut patch, admin_notes);

        self.write(appointment, patch).await.map(LifecycleOutcome::Applied)
    }

    /// confirmed/paid → completed. Completing twice only refreshes `updated_at`.
    pub async fn complete(&self, appointment_id: &str) -> Result<LifecycleOutcome, AppointmentError> {
        let appointment = fetch_appointment(self.store.as_ref(), appointment_id).await?;
        if appointment.status != AppointmentStatus::Completed {
            self.rules
                .validate_status_transition(&appointment.status, &AppointmentStatus::Completed)?;
        }

        if !self.prompt.confirm(appointment_id, COMPLETE_PROMPT).await {
            debug!("Completion of {} not confirmed", appointment_id);
            return Ok(LifecycleOutcome::Aborted);
        }

        info!("Completing appointment {}", appointment_id);
        let mut patch = Map::new();
        patch.insert("status".into(), status_value(AppointmentStatus::Completed));
        patch.insert("updated_at".into(), timestamp_value(Timestamp::now()));

        self.write(appointment, patch).await.map(LifecycleOutcome::Applied)
    }

    /// Fee breakdown for the refund confirmation.
    pub async fn refund_quote(&self, appointment_id: &str) -> Result<RefundQuote, AppointmentError> {
        let appointment = fetch_appointment(self.store.as_ref(), appointment_id).await?;
        ensure_refundable(&appointment)?;
        Ok(RefundQuote::for_appointment(&appointment))
    }

    /// Cancels a paid appointment and marks the payment refunded. The refund
    /// amount is shown to the operator only.
    pub async fn refund(&self, appointment_id: &str) -> Result<LifecycleOutcome, AppointmentError> {
        let appointment = fetch_appointment(self.store.as_ref(), appointment_id).await?;
        ensure_refundable(&appointment)?;

        let quote = RefundQuote::for_appointment(&appointment);
        let message = quote.confirmation_message(appointment.patient_label());
        if !self.prompt.confirm(appointment_id, &message).await {
            debug!("Refund of {} not confirmed", appointment_id);
            return Ok(LifecycleOutcome::Aborted);
        }

        info!(
            "Refunding appointment {} ({} of {}, paid {})",
            appointment_id,
            quote.refund_amount,
            quote.original_amount,
            Timestamp::display_or_na(appointment.paid_at.as_ref())
        );
        let now = Timestamp::now();
        let mut patch = Map::new();
        patch.insert("status".into(), status_value(AppointmentStatus::Cancelled));
        patch.insert("payment_status".into(), Value::String(PaymentStatus::Refunded.to_string()));
        patch.insert("cancellation_reason".into(), Value::String(REFUND_REASON.to_string()));
        patch.insert("cancelled_at".into(), timestamp_value(now));
        patch.insert("updated_at".into(), timestamp_value(now));

        self.write(appointment, patch).await.map(LifecycleOutcome::Applied)
    }

    async fn write(&self, appointment: Appointment, patch: Map<String, Value>) -> Result<Appointment, AppointmentError> {
        let id = appointment.id.clone();

        if let Err(e) = self
            .store
            .update(&appointments_collection(), &id, patch.clone())
            .await
        {
            error!("Failed to update appointment {}: {}", id, e);
            self.prompt
                .alert(&format!("Failed to update appointment. Please try again. ({})", e))
                .await;
            return Err(AppointmentError::WriteFailed(e.to_string()));
        }

        apply_patch(appointment, patch)
    }
}

fn ensure_refundable(appointment: &Appointment) -> Result<(), AppointmentError> {
    if appointment.is_refundable() {
        return Ok(());
    }
    Err(AppointmentError::NotRefundable(format!(
        "status {}, payment {}",
        appointment.status, appointment.payment_status
    )))
}

fn apply_patch(appointment: Appointment, patch: Map<String, Value>) -> Result<Appointment, AppointmentError> {
    let id = appointment.id.clone();
    let malformed = |e: serde_json::Error| AppointmentError::Malformed {
        id: id.clone(),
        reason: e.to_string(),
    };

    let mut row = serde_json::to_value(appointment).map_err(malformed)?;
    if let Value::Object(fields) = &mut row {
        fields.extend(patch);
    }
    serde_json::from_value(row).map_err(malformed)
}

fn status_value(status: AppointmentStatus) -> Value {
    Value::String(status.to_string())
}

fn timestamp_value(at: Timestamp) -> Value {
    Value::String(at.to_rfc3339())
}

fn insert_notes(patch: &mut Map<String, Value>, admin_notes: Option<String>) {
    if let Some(notes) = admin_notes.filter(|notes| !notes.trim().is_empty()) {
        patch.insert("admin_notes".into(), Value::String(notes));
    }
}
