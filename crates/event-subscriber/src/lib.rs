//! Resilient streaming-event subscription client.
//!
//! Keeps a server-streaming gRPC subscription open against a remote event
//! service, runs a user callback for every delivered event on a bounded
//! worker pool, and acknowledges events whose callback succeeded. On any
//! stream termination the subscription is reopened after a fixed,
//! cause-dependent delay, forever, until explicitly closed.
//!
//! # Semantics
//! - At-least-once delivery: an event is acked only after its handler
//!   returns `Ok`; a failed handler (or a crash mid-handling) leads to
//!   server-side redelivery, never silent loss.
//! - Events are handed to the pool in arrival order, but with a pool size
//!   above 1 processing and acknowledgment may complete out of order.
//! - Reconnect delays are flat: 10 s after `UNAUTHENTICATED` (credential
//!   refresh time), 1 s after everything else including clean stream ends.
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use event_subscriber::{EventListener, ListenerConfig, SubscribeRequest};
//!
//! let channel = tonic::transport::Channel::from_static("http://localhost:9090")
//!     .connect()
//!     .await?;
//!
//! let request = SubscribeRequest {
//!     types: vec!["roaming".into()],
//!     durable_name: "my-durable".into(),
//!     max_in_flight: 50,
//!     ..Default::default()
//! };
//!
//! let mut config = ListenerConfig::new(
//!     request,
//!     Arc::new(|event| {
//!         Box::pin(async move {
//!             println!("got event #{:?}", event.metadata.map(|m| m.sequence));
//!             Ok(())
//!         })
//!     }),
//! );
//! config.token_provider = Some(Arc::new(|| Ok("my-access-token".to_string())));
//!
//! let listener = EventListener::create_started(channel, config)?;
//! // ... application runs ...
//! listener.close().await;
//! # Ok(())
//! # }
//! ```

mod auth;
mod dispatch;
mod listener;
mod types;

pub use events_proto::{
    Event, EventMetadata, ManualAckConfig, StartPosition, SubscribeRequest,
};
pub use listener::EventListener;
pub use types::{
    BoxError, DEFAULT_CONCURRENCY, DEFAULT_QUEUE_CAPACITY, Error, EventHandler, HandlerFuture,
    ListenerConfig, RetryPolicy, TokenProvider,
};
