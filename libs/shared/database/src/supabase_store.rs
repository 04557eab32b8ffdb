use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::store::{
    CollectionRef, Document, DocumentStore, Query, SnapshotListener, StoreError, SubscriptionHandle,
};
use crate::supabase::{return_representation, SupabaseClient, SupabaseError};

/// `DocumentStore` over PostgREST. Collections are tables; a subcollection is
/// the child table filtered on its parent column. Subscriptions poll.
#[derive(Clone)]
pub struct SupabaseStore {
    supabase: Arc<SupabaseClient>,
    auth_token: Arc<str>,
    poll_interval: Duration,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig, auth_token: &str) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            auth_token: Arc::from(auth_token),
            poll_interval: config.poll_interval(),
        }
    }

    fn table_path(collection: &CollectionRef) -> (String, Vec<String>) {
        let mut filters = Vec::new();
        if let Some(parent) = collection.parent() {
            filters.push(format!("{}=eq.{}", parent.field, urlencoding::encode(&parent.id)));
        }
        (format!("/rest/v1/{}", collection.name()), filters)
    }

    fn with_query(path: String, filters: Vec<String>) -> String {
        if filters.is_empty() {
            path
        } else {
            format!("{}?{}", path, filters.join("&"))
        }
    }

    fn rows_to_documents(collection: &CollectionRef, rows: Vec<Value>) -> Vec<Document> {
        rows.into_iter()
            .filter_map(|row| {
                let document = Document::from_value(row);
                if document.is_none() {
                    warn!("Dropping {} row without an id", collection);
                }
                document
            })
            .collect()
    }
}

fn map_error(collection: &CollectionRef, id: Option<&str>, err: anyhow::Error) -> StoreError {
    match err.downcast_ref::<SupabaseError>() {
        Some(SupabaseError::Unauthorized(body)) => StoreError::PermissionDenied(body.clone()),
        Some(SupabaseError::NotFound(_)) => StoreError::NotFound {
            collection: collection.to_string(),
            id: id.unwrap_or_default().to_string(),
        },
        _ => StoreError::Request(err.to_string()),
    }
}

#[async_trait]
impl DocumentStore for SupabaseStore {
    async fn list(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let (path, mut filters) = Self::table_path(&query.collection);
        if let Some(order) = &query.order_by {
            filters.push(format!("order={}.{}", order.field, order.direction.as_postgrest()));
        }
        let path = Self::with_query(path, filters);

        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(&*self.auth_token), None)
            .await
            .map_err(|e| map_error(&query.collection, None, e))?;

        debug!("Fetched {} rows from {}", rows.len(), query.collection);
        Ok(Self::rows_to_documents(&query.collection, rows))
    }

    async fn get(&self, collection: &CollectionRef, id: &str) -> Result<Option<Document>, StoreError> {
        let (path, mut filters) = Self::table_path(collection);
        filters.push(format!("id=eq.{}", urlencoding::encode(id)));
        let path = Self::with_query(path, filters);

        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(&*self.auth_token), None)
            .await
            .map_err(|e| map_error(collection, Some(id), e))?;

        Ok(Self::rows_to_documents(collection, rows).into_iter().next())
    }

    async fn update(
        &self,
        collection: &CollectionRef,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let (path, mut filters) = Self::table_path(collection);
        filters.push(format!("id=eq.{}", urlencoding::encode(id)));
        let path = Self::with_query(path, filters);

        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(&*self.auth_token),
                Some(Value::Object(patch)),
                Some(return_representation()),
            )
            .await
            .map_err(|e| map_error(collection, Some(id), e))?;

        // PostgREST answers an update that matched nothing with `[]`.
        if rows.is_empty() {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }

        debug!("Updated {}/{}", collection, id);
        Ok(())
    }

    async fn add(&self, collection: &CollectionRef, mut fields: Map<String, Value>) -> Result<String, StoreError> {
        if let Some(parent) = collection.parent() {
            fields.insert(parent.field.clone(), Value::String(parent.id.clone()));
        }
        let (path, _) = Self::table_path(collection);

        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::POST,
                &path,
                Some(&*self.auth_token),
                Some(Value::Object(fields)),
                Some(return_representation()),
            )
            .await
            .map_err(|e| map_error(collection, None, e))?;

        let document = Self::rows_to_documents(collection, rows)
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Malformed(format!("insert into {} returned no row", collection)))?;

        debug!("Added {}/{}", collection, document.id);
        Ok(document.id)
    }

    async fn subscribe(
        &self,
        query: Query,
        listener: SnapshotListener,
    ) -> Result<SubscriptionHandle, StoreError> {
        let store = self.clone();
        let interval = self.poll_interval;
        let label = query.collection.to_string();

        let task = tokio::spawn(async move {
            let mut last: Option<Vec<Document>> = None;
            loop {
                match store.list(&query).await {
                    Ok(documents) => {
                        if last.as_ref() != Some(&documents) {
                            listener(documents.clone());
                            last = Some(documents);
                        }
                    }
                    Err(e) => warn!("Polling {} failed: {}", query.collection, e),
                }
                tokio::time::sleep(interval).await;
            }
        });

        debug!("Polling {} every {:?}", label, interval);
        let abort = task.abort_handle();
        Ok(SubscriptionHandle::new(move || {
            abort.abort();
            debug!("Stopped polling {}", label);
        }))
    }
}
