use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use serde::{Serialize, Serializer};
use tracing::warn;

/// Sends a snapshot shared behind an `Arc` without copying it out.
#[derive(Debug)]
pub struct Shared<T>(pub Arc<T>);

impl<T: Serialize> Serialize for Shared<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.as_ref().serialize(serializer)
    }
}

/// Turns a stream of snapshots into a server-sent-event response. Each item
/// is sent as one `event` with a JSON body. The underlying subscription lives
/// exactly as long as the client connection.
pub fn snapshot_events<S, T>(
    event: &'static str,
    snapshots: S,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize + Send + 'static,
{
    let events = snapshots.filter_map(move |snapshot| async move {
        match Event::default().event(event).json_data(&snapshot) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                warn!("Dropping unserializable {} event: {}", event, e);
                None
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
