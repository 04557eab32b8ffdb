use std::marker::PhantomData;
use std::sync::Arc;

use futures::Stream;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::store::{Document, DocumentStore, Query, StoreError, SubscriptionHandle};

/// A typed, subscription-refreshed copy of one collection.
///
/// Every snapshot replaces the whole list; consumers hold `Arc<Vec<T>>`
/// values, so pointer identity tells whether anything changed. The store
/// listener is released when this value is dropped.
pub struct LiveCollection<T> {
    records: watch::Receiver<Option<Arc<Vec<T>>>>,
    subscription: SubscriptionHandle,
    _marker: PhantomData<fn() -> T>,
}

impl<T> LiveCollection<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    pub async fn open(store: &dyn DocumentStore, query: Query) -> Result<Self, StoreError> {
        let (sender, records) = watch::channel(None);
        let label = query.collection.to_string();

        let subscription = store
            .subscribe(
                query,
                Box::new(move |documents| {
                    let mapped = decode_all::<T>(&label, documents);
                    debug!("Snapshot of {} with {} records", label, mapped.len());
                    sender.send_replace(Some(Arc::new(mapped)));
                }),
            )
            .await?;

        Ok(Self {
            records,
            subscription,
            _marker: PhantomData,
        })
    }

    /// True until the first snapshot has been delivered.
    pub fn is_loading(&self) -> bool {
        self.records.borrow().is_none()
    }

    /// The latest list, empty while loading.
    pub fn current(&self) -> Arc<Vec<T>> {
        self.records.borrow().clone().unwrap_or_default()
    }

    /// Waits for the next snapshot that has not been observed yet.
    pub async fn changed(&mut self) -> Result<Arc<Vec<T>>, StoreError> {
        loop {
            self.records
                .changed()
                .await
                .map_err(|_| StoreError::Request("subscription closed".to_string()))?;
            if let Some(records) = self.records.borrow_and_update().clone() {
                return Ok(records);
            }
        }
    }

    /// Resolves with the first snapshot, immediately if it already arrived.
    pub async fn loaded(&mut self) -> Result<Arc<Vec<T>>, StoreError> {
        if let Some(records) = self.records.borrow_and_update().clone() {
            return Ok(records);
        }
        self.changed().await
    }

    /// Stream of snapshots, starting with the current one if loaded.
    pub fn into_stream(self) -> impl Stream<Item = Arc<Vec<T>>> + Send + 'static {
        futures::stream::unfold((self, true), |(mut live, first)| async move {
            let next = if first { live.loaded().await } else { live.changed().await };
            next.ok().map(|records| (records, (live, false)))
        })
    }

    pub fn close(self) {
        self.subscription.unsubscribe();
    }
}

/// Maps documents to records, skipping (and logging) the ones that do not fit.
pub fn decode_all<T: DeserializeOwned>(label: &str, documents: Vec<Document>) -> Vec<T> {
    documents
        .iter()
        .filter_map(|document| match document.decode::<T>() {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping malformed {} document {}: {}", label, document.id, e);
                None
            }
        })
        .collect()
}
