//! Public types for the event-subscriber crate.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use events_proto::{Event, SubscribeRequest};

/// A boxed error type for user-supplied callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Future returned by an [`EventHandler`].
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send>>;

/// User callback invoked once per delivered event.
///
/// A handler returning `Ok(())` triggers the acknowledgment for that event;
/// returning `Err` withholds it, so the server redelivers the event after
/// its ack timeout. Handlers may run concurrently across different events,
/// up to [`ListenerConfig::concurrency`].
pub type EventHandler = Arc<dyn Fn(Event) -> HandlerFuture + Send + Sync>;

/// Supplies the bearer token attached to outgoing calls.
///
/// Invoked per call at send time, so a provider backed by a refreshing
/// OAuth2 cache always contributes the latest token.
pub type TokenProvider = Arc<dyn Fn() -> Result<String, BoxError> + Send + Sync>;

/// Default number of concurrently running event handlers.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default capacity of the queue between the receive path and the handlers.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Reconnect delays, keyed by the termination cause of the most recent
/// stream attempt. There is no attempt counter and no exponential growth:
/// the subscription is a durable long-running consumer that retries
/// indefinitely at a flat rate.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Delay after transport errors, server errors, and clean stream ends.
    pub reconnect_delay: Duration,
    /// Delay after `UNAUTHENTICATED`, leaving time for a fresh credential
    /// to propagate instead of hammering the identity backend.
    pub auth_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(1),
            auth_delay: Duration::from_secs(10),
        }
    }
}

/// Configuration for an [`EventListener`](crate::EventListener).
pub struct ListenerConfig {
    /// Subscription request, replayed verbatim on every reconnect.
    pub request: SubscribeRequest,
    /// Callback invoked once per delivered event.
    pub handler: EventHandler,
    /// Optional bearer-token source. `None` sends calls unauthenticated.
    pub token_provider: Option<TokenProvider>,
    /// Maximum handlers running at once. Must be at least 1.
    pub concurrency: usize,
    /// Capacity of the hand-off queue feeding the handlers. Must be at
    /// least 1; events arriving while it is full are dropped and left to
    /// server-side redelivery.
    pub queue_capacity: usize,
    pub retry: RetryPolicy,
}

impl ListenerConfig {
    pub fn new(request: SubscribeRequest, handler: EventHandler) -> Self {
        Self {
            request,
            handler,
            token_provider: None,
            concurrency: DEFAULT_CONCURRENCY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            retry: RetryPolicy::default(),
        }
    }
}

/// Errors returned by this crate. Only construction can fail; steady-state
/// failures are handled by the retry loop and logged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_handler() -> EventHandler {
        Arc::new(|_event| Box::pin(async { Ok(()) }))
    }

    #[test]
    fn config_defaults() {
        let config = ListenerConfig::new(SubscribeRequest::default(), noop_handler());
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert!(config.token_provider.is_none());
    }

    #[test]
    fn retry_policy_defaults() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.reconnect_delay, Duration::from_secs(1));
        assert_eq!(retry.auth_delay, Duration::from_secs(10));
    }
}
