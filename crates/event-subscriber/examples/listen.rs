//! Subscribe to an event service and print every delivered event.
//!
//! ```sh
//! cargo run -p event-subscriber --example listen -- <ENDPOINT> [TYPE...]
//! ```
//!
//! Or pass the endpoint via environment variable:
//! ```sh
//! EVENTS_ENDPOINT=http://localhost:9090 cargo run -p event-subscriber --example listen \
//!     -- roaming handset_update
//! ```
//!
//! A bearer token is read from `EVENTS_TOKEN` if set; without it the calls
//! go out unauthenticated. Runs until Ctrl-C, then closes the listener.

use std::sync::Arc;

use event_subscriber::{
    EventListener, ListenerConfig, ManualAckConfig, StartPosition, SubscribeRequest, TokenProvider,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let env_endpoint = std::env::var("EVENTS_ENDPOINT").ok();

    let (endpoint, types) = if let Some(endpoint) = env_endpoint {
        (endpoint, args)
    } else {
        let (endpoint, types) = args
            .split_first()
            .ok_or("usage: listen <ENDPOINT> [TYPE...]")?;
        (endpoint.clone(), types.to_vec())
    };

    eprintln!("subscribing to '{endpoint}' ...");
    let channel = tonic::transport::Channel::from_shared(endpoint)?
        .connect()
        .await?;

    let request = SubscribeRequest {
        types,
        durable_name: "listen-example".to_string(),
        queue_name: "listen-example".to_string(),
        max_in_flight: 50,
        start_position: StartPosition::Oldest as i32,
        start_at_sequence: None,
        manual_ack: Some(ManualAckConfig {
            enable: true,
            timeout: Some(prost_types::Duration {
                seconds: 30,
                nanos: 0,
            }),
        }),
    };

    let mut config = ListenerConfig::new(
        request,
        Arc::new(|event| {
            Box::pin(async move {
                let sequence = event.metadata.as_ref().map_or(0, |m| m.sequence);
                eprintln!(
                    "[event] seq={sequence} type={} {} bytes",
                    event.event_type,
                    event.payload.len()
                );
                Ok(())
            })
        }),
    );
    if let Ok(token) = std::env::var("EVENTS_TOKEN") {
        let provider: TokenProvider = Arc::new(move || Ok(token.clone()));
        config.token_provider = Some(provider);
    }

    let listener = EventListener::create_started(channel, config)?;

    tokio::signal::ctrl_c().await?;
    eprintln!("closing ...");
    listener.close().await;

    Ok(())
}
