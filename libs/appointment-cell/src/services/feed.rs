use std::sync::Arc;

use futures::Stream;
use tracing::debug;

use shared_database::{decode_all, CollectionRef, Direction, DocumentStore, LiveCollection, Query, StoreError};

use crate::models::{Appointment, AppointmentError};
use crate::services::views::{DashboardQuery, DashboardView, ViewCache};

pub const APPOINTMENTS: &str = "appointments";

pub fn appointments_collection() -> CollectionRef {
    CollectionRef::new(APPOINTMENTS)
}

/// Standing order of the appointment feed: newest appointment date first.
pub fn appointments_query() -> Query {
    Query::new(appointments_collection()).order_by("appointment_date", Direction::Descending)
}

pub async fn fetch_appointments(store: &dyn DocumentStore) -> Result<Vec<Appointment>, StoreError> {
    let documents = store.list(&appointments_query()).await?;
    Ok(decode_all(APPOINTMENTS, documents))
}

pub async fn fetch_appointment(store: &dyn DocumentStore, id: &str) -> Result<Appointment, AppointmentError> {
    let document = store
        .get(&appointments_collection(), id)
        .await?
        .ok_or_else(|| AppointmentError::NotFound(id.to_string()))?;

    document.decode().map_err(|e| AppointmentError::Malformed {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

/// One operator's live view of the appointments collection.
pub struct AppointmentDashboard {
    live: LiveCollection<Appointment>,
    cache: ViewCache,
}

impl AppointmentDashboard {
    pub async fn open(store: &dyn DocumentStore) -> Result<Self, StoreError> {
        debug!("Opening appointment dashboard subscription");
        let live = LiveCollection::open(store, appointments_query()).await?;
        Ok(Self {
            live,
            cache: ViewCache::default(),
        })
    }

    pub fn is_loading(&self) -> bool {
        self.live.is_loading()
    }

    /// Current view for `query`, rebuilt only when the snapshot or the query
    /// changed since the last call.
    pub fn view(&mut self, query: &DashboardQuery) -> Arc<DashboardView> {
        let records = self.live.current();
        self.cache.get(&records, query)
    }

    /// Waits for the first snapshot.
    pub async fn loaded(&mut self) -> Result<Arc<Vec<Appointment>>, StoreError> {
        self.live.loaded().await
    }

    pub async fn changed(&mut self) -> Result<Arc<Vec<Appointment>>, StoreError> {
        self.live.changed().await
    }

    /// One view per snapshot for event-stream consumers, starting with the
    /// first one. Ends the subscription when the stream is dropped.
    pub fn into_views(self, query: DashboardQuery) -> impl Stream<Item = Arc<DashboardView>> + Send + 'static {
        futures::stream::unfold((self, query, true), |(mut dashboard, query, first)| async move {
            let next = if first { dashboard.loaded().await } else { dashboard.changed().await };
            match next {
                Ok(_) => {
                    let view = dashboard.view(&query);
                    Some((view, (dashboard, query, false)))
                }
                Err(e) => {
                    debug!("Appointment feed closed: {}", e);
                    None
                }
            }
        })
    }
}
