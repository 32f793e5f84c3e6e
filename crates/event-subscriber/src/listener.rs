//! The reconnecting subscription engine.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::transport::Channel;
use tonic::{Code, Status};

use events_proto::events_client::EventsClient;
use events_proto::{AckRequest, Event, EventMetadata, SubscribeRequest};

use crate::auth::BearerAuth;
use crate::dispatch;
use crate::types::{Error, EventHandler, ListenerConfig, RetryPolicy};

/// How long `close()` waits for background tasks to settle.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

type AuthedChannel = tonic::service::interceptor::InterceptedService<Channel, BearerAuth>;

/// A long-lived subscription to the remote event service.
///
/// Once started, the listener keeps a server-streaming `Subscribe` call
/// open and hands every delivered event to the configured handler on a
/// bounded worker pool. Handlers that complete successfully are followed
/// by exactly one `Ack` call; failing handlers leave their event
/// unacknowledged so the server redelivers it after the ack timeout
/// (at-least-once delivery). Any stream termination, error or clean close,
/// schedules a reopen with the identical request after a
/// [`RetryPolicy`]-selected delay, indefinitely, until [`close`] is called.
///
/// With `concurrency > 1`, events are handed to the pool in arrival order
/// but may complete and be acknowledged out of order.
///
/// The transport [`Channel`] stays owned by the caller: the listener only
/// opens logical calls on it and never shuts it down, so several listeners
/// can share one channel.
///
/// [`close`]: EventListener::close
pub struct EventListener {
    started: AtomicBool,
    inner: Arc<Inner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

struct Inner {
    client: EventsClient<AuthedChannel>,
    request: SubscribeRequest,
    handler: EventHandler,
    retry: RetryPolicy,
    concurrency: usize,
    queue_capacity: usize,
    cancel: CancellationToken,
    dropped_events: AtomicU64,
}

impl EventListener {
    /// Create a listener without starting it. Fails only on invalid
    /// configuration.
    pub fn new(channel: Channel, config: ListenerConfig) -> Result<Self, Error> {
        if config.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1"));
        }
        if config.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be at least 1"));
        }
        let client = EventsClient::with_interceptor(channel, BearerAuth::new(config.token_provider));
        Ok(Self {
            started: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
            inner: Arc::new(Inner {
                client,
                request: config.request,
                handler: config.handler,
                retry: config.retry,
                concurrency: config.concurrency,
                queue_capacity: config.queue_capacity,
                cancel: CancellationToken::new(),
                dropped_events: AtomicU64::new(0),
            }),
        })
    }

    /// Create a listener and start it immediately.
    pub fn create_started(channel: Channel, config: ListenerConfig) -> Result<Self, Error> {
        let listener = Self::new(channel, config)?;
        listener.start();
        Ok(listener)
    }

    /// Open the first stream. Idempotent: a second call, or a call after
    /// [`close`](EventListener::close), is a no-op.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let (tx, rx) = mpsc::channel(self.inner.queue_capacity);
        let ack: dispatch::AckFn = {
            let inner = Arc::clone(&self.inner);
            Arc::new(move |metadata| inner.spawn_ack(metadata))
        };
        let pool = tokio::spawn(dispatch::run(
            rx,
            self.inner.concurrency,
            Arc::clone(&self.inner.handler),
            ack,
        ));
        let loop_task = tokio::spawn(run_loop(Arc::clone(&self.inner), tx));

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.push(pool);
        tasks.push(loop_task);
    }

    /// Stop the subscription: abort the in-flight call, prevent any
    /// further reconnect, and wait up to a fixed grace period for the
    /// background tasks to settle. A grace timeout is swallowed; `close`
    /// never fails. Callback work already queued is left to finish, but
    /// no ack is issued once `close` has begun.
    pub async fn close(&self) {
        self.inner.cancel.cancel();
        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *tasks)
        };
        let drain = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            tracing::warn!("timed out waiting for background tasks while closing");
        }
    }

    /// Acknowledge one event, fire-and-forget. Success and failure are
    /// both logged, never returned: a failed ack is corrected by the
    /// server redelivering the event, not by a local retry.
    ///
    /// Must be called from within a tokio runtime.
    pub fn acknowledge(&self, event: &Event) {
        match &event.metadata {
            Some(metadata) => self.inner.spawn_ack(metadata.clone()),
            None => tracing::warn!("event carried no metadata, nothing to ack"),
        }
    }
}

impl Inner {
    fn spawn_ack(&self, metadata: EventMetadata) {
        let sequence = metadata.sequence;
        if self.cancel.is_cancelled() {
            tracing::debug!(sequence, "listener closed, suppressing ack");
            return;
        }
        let mut client = self.client.clone();
        tokio::spawn(async move {
            let request = AckRequest {
                sequence,
                inbox: metadata.ack_inbox,
            };
            match client.ack(request).await {
                Ok(_) => tracing::info!(sequence, "acknowledged event"),
                Err(status) => {
                    tracing::warn!(sequence, "event acknowledgment failed: {status}");
                }
            }
        });
    }
}

enum StreamEnd {
    Cancelled,
    Completed,
    Failed(Status),
}

async fn run_loop(inner: Arc<Inner>, tx: mpsc::Sender<Event>) {
    loop {
        tracing::info!("starting subscription");
        let delay = match run_stream(&inner, &tx).await {
            StreamEnd::Cancelled => return,
            StreamEnd::Completed => {
                tracing::info!("connection closed by server");
                inner.retry.reconnect_delay
            }
            StreamEnd::Failed(status) => {
                tracing::warn!(code = ?status.code(), "subscription stream failed: {status}");
                retry_delay(&inner.retry, status.code())
            }
        };

        tracing::info!(delay_ms = delay.as_millis() as u64, "scheduling reconnect");
        tokio::select! {
            _ = inner.cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// The delay is derived solely from the termination cause, never from an
/// attempt counter.
fn retry_delay(retry: &RetryPolicy, code: Code) -> Duration {
    if code == Code::Unauthenticated {
        retry.auth_delay
    } else {
        retry.reconnect_delay
    }
}

/// One stream attempt: open, pull frames, hand events to the worker pool
/// without blocking the receive path.
async fn run_stream(inner: &Inner, tx: &mpsc::Sender<Event>) -> StreamEnd {
    let mut client = inner.client.clone();
    let mut stream = tokio::select! {
        _ = inner.cancel.cancelled() => return StreamEnd::Cancelled,
        opened = client.subscribe(inner.request.clone()) => match opened {
            Ok(response) => response.into_inner(),
            Err(status) => return StreamEnd::Failed(status),
        }
    };

    loop {
        let message = tokio::select! {
            _ = inner.cancel.cancelled() => return StreamEnd::Cancelled,
            message = stream.message() => message,
        };
        match message {
            Ok(Some(response)) => {
                let Some(event) = response.event else {
                    tracing::debug!("frame without event, ignoring");
                    continue;
                };
                match tx.try_send(event) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(event)) => {
                        let dropped = inner.dropped_events.fetch_add(1, Ordering::Relaxed) + 1;
                        tracing::warn!(
                            sequence = event.metadata.as_ref().map(|m| m.sequence),
                            total_dropped = dropped,
                            "callback queue full, dropping event for redelivery"
                        );
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => return StreamEnd::Cancelled,
                }
            }
            Ok(None) => return StreamEnd::Completed,
            Err(status) => return StreamEnd::Failed(status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventHandler, ListenerConfig};

    fn noop_handler() -> EventHandler {
        Arc::new(|_event| Box::pin(async { Ok(()) }))
    }

    fn lazy_channel() -> Channel {
        Channel::from_static("http://127.0.0.1:1").connect_lazy()
    }

    #[test]
    fn unauthenticated_gets_the_long_delay() {
        let retry = RetryPolicy {
            reconnect_delay: Duration::from_secs(1),
            auth_delay: Duration::from_secs(10),
        };
        assert_eq!(retry_delay(&retry, Code::Unauthenticated), retry.auth_delay);
    }

    #[test]
    fn other_codes_get_the_short_delay() {
        let retry = RetryPolicy::default();
        for code in [
            Code::Unavailable,
            Code::Internal,
            Code::Unknown,
            Code::Cancelled,
            Code::PermissionDenied,
        ] {
            assert_eq!(retry_delay(&retry, code), retry.reconnect_delay);
        }
    }

    #[tokio::test]
    async fn zero_concurrency_is_rejected() {
        let mut config = ListenerConfig::new(SubscribeRequest::default(), noop_handler());
        config.concurrency = 0;
        let result = EventListener::new(lazy_channel(), config);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn zero_queue_capacity_is_rejected() {
        let mut config = ListenerConfig::new(SubscribeRequest::default(), noop_handler());
        config.queue_capacity = 0;
        let result = EventListener::new(lazy_channel(), config);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn start_after_close_is_a_no_op() {
        let config = ListenerConfig::new(SubscribeRequest::default(), noop_handler());
        let listener = EventListener::new(lazy_channel(), config).unwrap();
        listener.close().await;
        listener.start();
        assert!(listener.tasks.lock().unwrap().is_empty());
    }
}
