use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use shared_database::{compare_values, Direction};

use crate::models::{Appointment, AppointmentError, AppointmentStatus, PaymentStatus};

/// Which status bucket the list shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusView {
    Pending,
    Confirmed,
    #[default]
    All,
}

impl StatusView {
    pub fn includes(&self, appointment: &Appointment) -> bool {
        match self {
            StatusView::Pending => appointment.is_awaiting_review(),
            StatusView::Confirmed => appointment.is_confirmed(),
            StatusView::All => true,
        }
    }
}

/// Counts and sums over the full, unfiltered appointment set.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AppointmentStats {
    pub total: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub total_revenue: f64,
    pub pending_payments: f64,
}

pub fn compute_stats(appointments: &[Appointment]) -> AppointmentStats {
    appointments
        .iter()
        .fold(AppointmentStats { total: appointments.len(), ..Default::default() }, |mut stats, a| {
            if a.is_awaiting_review() {
                stats.pending += 1;
            }
            if a.is_confirmed() {
                stats.confirmed += 1;
            }
            match a.status {
                AppointmentStatus::Completed => stats.completed += 1,
                AppointmentStatus::Cancelled => stats.cancelled += 1,
                _ => {}
            }
            match a.payment_status {
                PaymentStatus::Paid => stats.total_revenue += a.amount,
                PaymentStatus::Pending => stats.pending_payments += a.amount,
                PaymentStatus::Refunded => {}
            }
            stats
        })
}

/// Status bucket, then search. An empty or blank term keeps everything.
pub fn filter_appointments<'a>(
    appointments: &'a [Appointment],
    view: StatusView,
    search: &str,
) -> Vec<&'a Appointment> {
    let needle = search.trim().to_lowercase();
    appointments
        .iter()
        .filter(|a| view.includes(a))
        .filter(|a| needle.is_empty() || a.matches_search(&needle))
        .collect()
}

/// Column sort of the appointment table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortState {
    pub field: String,
    pub direction: Direction,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            field: "appointment_date".to_string(),
            direction: Direction::Descending,
        }
    }
}

impl SortState {
    pub fn new(field: &str, direction: Direction) -> Result<Self, AppointmentError> {
        if !Appointment::SORTABLE_FIELDS.contains(&field) {
            return Err(AppointmentError::ValidationError(format!("Cannot sort by '{}'", field)));
        }
        Ok(Self { field: field.to_string(), direction })
    }

    /// Header click: the active column flips, any other column starts ascending.
    pub fn toggle(&mut self, field: &str) {
        if self.field == field {
            self.direction = match self.direction {
                Direction::Ascending => Direction::Descending,
                Direction::Descending => Direction::Ascending,
            };
        } else {
            self.field = field.to_string();
            self.direction = Direction::Ascending;
        }
    }
}

/// Stable sort on any appointment field, compared by its stored value.
pub fn sort_appointments(appointments: &mut Vec<Appointment>, sort: &SortState) {
    let mut keyed: Vec<(Option<Value>, Appointment)> = appointments
        .drain(..)
        .map(|a| {
            let key = serde_json::to_value(&a)
                .ok()
                .and_then(|mut row| row.get_mut(&sort.field).map(Value::take));
            (key, a)
        })
        .collect();

    keyed.sort_by(|(a, _), (b, _)| {
        let ordering = compare_values(a.as_ref(), b.as_ref());
        match sort.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    });

    appointments.extend(keyed.into_iter().map(|(_, a)| a));
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardQuery {
    pub view: StatusView,
    pub search: String,
    pub sort: Option<SortState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub appointments: Vec<Appointment>,
    pub stats: AppointmentStats,
    pub matching: usize,
}

pub fn build_dashboard(appointments: &[Appointment], query: &DashboardQuery) -> DashboardView {
    let mut visible: Vec<Appointment> = filter_appointments(appointments, query.view, &query.search)
        .into_iter()
        .cloned()
        .collect();
    if let Some(sort) = &query.sort {
        sort_appointments(&mut visible, sort);
    }

    DashboardView {
        matching: visible.len(),
        appointments: visible,
        stats: compute_stats(appointments),
    }
}

/// Remembers the last view, keyed by the identity of the record list it was
/// built from. Snapshots replace the list wholesale, so a new `Arc` is the
/// only way the data can change.
#[derive(Default)]
pub struct ViewCache {
    last: Option<(Arc<Vec<Appointment>>, DashboardQuery, Arc<DashboardView>)>,
}

impl ViewCache {
    pub fn get(&mut self, records: &Arc<Vec<Appointment>>, query: &DashboardQuery) -> Arc<DashboardView> {
        if let Some((cached_records, cached_query, view)) = &self.last {
            if Arc::ptr_eq(cached_records, records) && cached_query == query {
                return view.clone();
            }
        }

        let view = Arc::new(build_dashboard(records, query));
        self.last = Some((records.clone(), query.clone(), view.clone()));
        view
    }
}
