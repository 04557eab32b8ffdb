use std::sync::Arc;

use tracing::debug;

use shared_database::{decode_all, CollectionRef, Direction, DocumentStore, Query};

use crate::models::{
    AppUser, ClinicService, Invoice, InvoiceStatus, InvoiceSummary, PatientDocument, RecordsError, Schedule,
    UserSearchQuery,
};

pub const USERS: &str = "users";
pub const DOCUMENTS: &str = "documents";
pub const INVOICES: &str = "invoices";
pub const SERVICES: &str = "services";
pub const SCHEDULES: &str = "schedules";

const DEFAULT_PAGE_SIZE: usize = 50;

/// Read-only access to the clinic's reference collections.
pub struct RecordsService {
    store: Arc<dyn DocumentStore>,
}

impl RecordsService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        label: &'static str,
        query: Query,
    ) -> Result<Vec<T>, RecordsError> {
        let documents = self.store.list(&query).await?;
        debug!("Fetched {} {} rows", documents.len(), label);
        Ok(decode_all(label, documents))
    }

    /// Users newest first, filtered by name/email search, role and active flag.
    pub async fn search_users(&self, query: UserSearchQuery) -> Result<Vec<AppUser>, RecordsError> {
        let users: Vec<AppUser> = self
            .fetch(USERS, Query::new(CollectionRef::new(USERS)).order_by("created_at", Direction::Descending))
            .await?;

        let needle = query.search.as_deref().unwrap_or_default().trim().to_lowercase();
        let role = query.role.as_deref().map(str::to_lowercase);

        Ok(users
            .into_iter()
            .filter(|user| needle.is_empty() || user.matches_search(&needle))
            .filter(|user| match &role {
                Some(role) => user.role.as_deref().map(str::to_lowercase).as_ref() == Some(role),
                None => true,
            })
            .filter(|user| query.active.map_or(true, |active| user.is_active() == active))
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(DEFAULT_PAGE_SIZE))
            .collect())
    }

    pub async fn get_user(&self, user_id: &str) -> Result<AppUser, RecordsError> {
        let document = self
            .store
            .get(&CollectionRef::new(USERS), user_id)
            .await?
            .ok_or_else(|| RecordsError::UserNotFound(user_id.to_string()))?;

        document.decode().map_err(|e| RecordsError::Malformed {
            collection: USERS,
            id: user_id.to_string(),
            reason: e.to_string(),
        })
    }

    pub async fn documents_for_user(&self, user_id: &str) -> Result<Vec<PatientDocument>, RecordsError> {
        let query = Query::new(CollectionRef::sub(DOCUMENTS, "user_id", user_id))
            .order_by("uploaded_at", Direction::Descending);
        self.fetch(DOCUMENTS, query).await
    }

    pub async fn invoices_for_user(&self, user_id: &str) -> Result<Vec<Invoice>, RecordsError> {
        let query = Query::new(CollectionRef::sub(INVOICES, "user_id", user_id))
            .order_by("issued_at", Direction::Descending);
        self.fetch(INVOICES, query).await
    }

    pub async fn list_invoices(&self, status: Option<InvoiceStatus>) -> Result<Vec<Invoice>, RecordsError> {
        let invoices: Vec<Invoice> = self
            .fetch(
                INVOICES,
                Query::new(CollectionRef::new(INVOICES)).order_by("issued_at", Direction::Descending),
            )
            .await?;

        Ok(match status {
            Some(status) => invoices.into_iter().filter(|i| i.status == status).collect(),
            None => invoices,
        })
    }

    pub async fn invoice_summary(&self) -> Result<InvoiceSummary, RecordsError> {
        let invoices = self.list_invoices(None).await?;
        Ok(InvoiceSummary::from_invoices(&invoices))
    }

    pub async fn list_services(&self, active_only: bool) -> Result<Vec<ClinicService>, RecordsError> {
        let services: Vec<ClinicService> = self
            .fetch(SERVICES, Query::new(CollectionRef::new(SERVICES)).order_by("name", Direction::Ascending))
            .await?;

        Ok(services
            .into_iter()
            .filter(|service| !active_only || service.is_active())
            .collect())
    }

    pub async fn list_schedules(&self) -> Result<Vec<Schedule>, RecordsError> {
        let mut schedules: Vec<Schedule> = self.fetch(SCHEDULES, Query::new(CollectionRef::new(SCHEDULES))).await?;
        schedules.sort_by(|a, b| {
            a.day_of_week
                .cmp(&b.day_of_week)
                .then_with(|| a.start_time.cmp(&b.start_time))
        });
        Ok(schedules)
    }
}
