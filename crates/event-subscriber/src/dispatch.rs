//! Callback worker pool: runs user handlers and acks off the receive path.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};

use events_proto::{Event, EventMetadata};

use crate::types::EventHandler;

/// Issues the acknowledgment for a successfully handled event.
pub(crate) type AckFn = Arc<dyn Fn(EventMetadata) + Send + Sync>;

/// Drain `rx`, running at most `concurrency` handlers at once.
///
/// Events are pulled in arrival order; completion order across events is
/// unordered once `concurrency > 1`. A handler that returns `Ok` is
/// followed by exactly one ack; a handler that returns `Err` is logged and
/// its event left unacknowledged for server-side redelivery. Returns when
/// the sending side is dropped and the queue is drained.
pub(crate) async fn run(
    mut rx: mpsc::Receiver<Event>,
    concurrency: usize,
    handler: EventHandler,
    ack: AckFn,
) {
    let permits = Arc::new(Semaphore::new(concurrency));
    while let Some(event) = rx.recv().await {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            // The semaphore is never closed.
            return;
        };
        let handler = Arc::clone(&handler);
        let ack = Arc::clone(&ack);
        tokio::spawn(async move {
            let metadata = event.metadata.clone();
            let sequence = metadata.as_ref().map(|m| m.sequence);
            match handler(event).await {
                Ok(()) => match metadata {
                    Some(metadata) => ack(metadata),
                    None => tracing::warn!("event carried no metadata, nothing to ack"),
                },
                Err(e) => {
                    tracing::warn!(sequence, "event handler failed, skipping ack: {e}");
                }
            }
            drop(permit);
        });
    }
}
