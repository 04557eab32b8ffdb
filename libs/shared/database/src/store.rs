use std::cmp::Ordering;
use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// A top-level collection, or a subcollection scoped to one parent document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionRef {
    name: String,
    parent: Option<ParentRef>,
}

/// The field on child documents that holds the parent's id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParentRef {
    pub field: String,
    pub id: String,
}

impl CollectionRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), parent: None }
    }

    pub fn sub(name: impl Into<String>, parent_field: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: Some(ParentRef {
                field: parent_field.into(),
                id: parent_id.into(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent {
            Some(parent) => write!(f, "{}[{}={}]", self.name, parent.field, parent.id),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn as_postgrest(&self) -> &'static str {
        match self {
            Direction::Ascending => "asc",
            Direction::Descending => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub collection: CollectionRef,
    pub order_by: Option<OrderBy>,
}

impl Query {
    pub fn new(collection: CollectionRef) -> Self {
        Self { collection, order_by: None }
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy { field: field.into(), direction });
        self
    }

    /// Sorts documents the way the store would for this query. Stable.
    pub fn sort(&self, documents: &mut [Document]) {
        if let Some(order) = &self.order_by {
            documents.sort_by(|a, b| {
                let ordering = compare_values(a.field(&order.field), b.field(&order.field));
                match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }
    }
}

/// Absent and null sort first, then booleans, numbers and strings.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// A raw store document: the store-assigned id plus its fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self { id: id.into(), fields }
    }

    /// Splits a row object into id and fields. Rows without an id are rejected.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut fields) = value else {
            return None;
        };
        let id = match fields.remove("id")? {
            Value::String(id) => id,
            Value::Number(id) => id.to_string(),
            _ => return None,
        };
        Some(Self { id, fields })
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        if name == "id" {
            return None;
        }
        self.fields.get(name)
    }

    pub fn to_value(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert("id".to_string(), Value::String(self.id.clone()));
        Value::Object(map)
    }

    /// Maps the document into a typed record, with `id` merged in.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_value())
    }
}

pub type SnapshotListener = Box<dyn Fn(Vec<Document>) + Send + Sync + 'static>;

/// Keeps a subscription alive. Dropping it releases the listener.
pub struct SubscriptionHandle {
    release: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl SubscriptionHandle {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self { release: Some(Box::new(release)) }
    }

    pub fn unsubscribe(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("active", &self.release.is_some())
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Store request failed: {0}")]
    Request(String),

    #[error("Malformed document: {0}")]
    Malformed(String),
}

/// The remote document database as seen by the cells. Everything above this
/// trait is backend-agnostic.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// One-shot read of a whole collection.
    async fn list(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    async fn get(&self, collection: &CollectionRef, id: &str) -> Result<Option<Document>, StoreError>;

    /// Merges `patch` into an existing document. Last write wins.
    async fn update(
        &self,
        collection: &CollectionRef,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), StoreError>;

    /// Appends a document and returns its store-assigned id.
    async fn add(&self, collection: &CollectionRef, fields: Map<String, Value>) -> Result<String, StoreError>;

    /// Standing subscription: `listener` receives the full, ordered collection
    /// once initially and again after every change.
    async fn subscribe(
        &self,
        query: Query,
        listener: SnapshotListener,
    ) -> Result<SubscriptionHandle, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, value: Value) -> Document {
        let Value::Object(fields) = value else { unreachable!() };
        Document::new(id, fields)
    }

    #[test]
    fn from_value_requires_an_id() {
        assert!(Document::from_value(json!({ "name": "x" })).is_none());

        let parsed = Document::from_value(json!({ "id": 7, "name": "x" })).unwrap();
        assert_eq!(parsed.id, "7");
        assert!(!parsed.fields.contains_key("id"));
    }

    #[test]
    fn descending_sort_puts_missing_values_last() {
        let mut docs = vec![
            doc("a", json!({ "at": "2024-01-01" })),
            doc("b", json!({})),
            doc("c", json!({ "at": "2024-02-01" })),
        ];
        let query = Query::new(CollectionRef::new("x")).order_by("at", Direction::Descending);
        query.sort(&mut docs);

        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn dropping_a_handle_releases_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let handle = SubscriptionHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        handle.unsubscribe();

        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
