//! Wire contract for the remote event service (`events.v1.EventsService`).
//!
//! The service exposes two RPCs:
//!
//! | RPC       | Kind             | Request            | Response             |
//! |-----------|------------------|--------------------|----------------------|
//! | Subscribe | server streaming | [`SubscribeRequest`] | [`SubscribeResponse`] |
//! | Ack       | unary            | [`AckRequest`]     | [`AckResponse`]      |
//!
//! Message structs are written by hand with prost derives and the
//! client/server modules follow the tonic-build output shape, so the crate
//! builds without `protoc`. The client is what the subscription engine
//! talks through; the server trait exists for in-process mock services.

/// Where the server should start delivering events for a new durable name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum StartPosition {
    /// Server default (newest).
    Unspecified = 0,
    /// Start at the oldest event still retained.
    Oldest = 1,
    /// Start at the next event published after the subscription opens.
    Newest = 2,
}

/// Manual acknowledgment settings. When enabled, events not acked within
/// `timeout` are redelivered by the server.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ManualAckConfig {
    #[prost(bool, tag = "1")]
    pub enable: bool,
    #[prost(message, optional, tag = "2")]
    pub timeout: Option<prost_types::Duration>,
}

/// Subscription configuration, immutable once constructed. The same
/// request is replayed verbatim on every reconnect attempt.
#[derive(Clone, PartialEq, prost::Message)]
pub struct SubscribeRequest {
    /// Event type filters; empty means all types.
    #[prost(string, repeated, tag = "1")]
    pub types: Vec<String>,

    /// Durable subscription name; the server tracks the position under it.
    #[prost(string, tag = "2")]
    pub durable_name: String,

    /// Queue group name for server-side load distribution.
    #[prost(string, tag = "3")]
    pub queue_name: String,

    /// Maximum unacknowledged events in flight; 0 means server default.
    #[prost(int32, tag = "4")]
    pub max_in_flight: i32,

    #[prost(enumeration = "StartPosition", tag = "5")]
    pub start_position: i32,

    /// Exact sequence to start at; takes precedence over `start_position`.
    #[prost(uint64, optional, tag = "6")]
    pub start_at_sequence: Option<u64>,

    #[prost(message, optional, tag = "7")]
    pub manual_ack: Option<ManualAckConfig>,
}

/// Acknowledgment metadata attached to every delivered event.
#[derive(Clone, PartialEq, prost::Message)]
pub struct EventMetadata {
    /// Position token, unique per delivery.
    #[prost(uint64, tag = "1")]
    pub sequence: u64,

    /// Reply destination the ack must be sent to.
    #[prost(string, tag = "2")]
    pub ack_inbox: String,

    /// Server publish time, milliseconds since epoch.
    #[prost(int64, tag = "3")]
    pub timestamp_ms: i64,
}

/// One delivered event.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Event {
    #[prost(message, optional, tag = "1")]
    pub metadata: Option<EventMetadata>,

    #[prost(string, tag = "2")]
    pub event_type: String,

    #[prost(bytes = "vec", tag = "3")]
    pub payload: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SubscribeResponse {
    #[prost(message, optional, tag = "1")]
    pub event: Option<Event>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AckRequest {
    #[prost(uint64, tag = "1")]
    pub sequence: u64,

    #[prost(string, tag = "2")]
    pub inbox: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AckResponse {}

/// Generated-style gRPC client module.
pub mod events_client {
    use super::*;
    use tonic::codegen::*;

    /// Client for `events.v1.EventsService`.
    #[derive(Debug, Clone)]
    pub struct EventsClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl EventsClient<tonic::transport::Channel> {
        /// Create a new client from a channel.
        pub fn new(channel: tonic::transport::Channel) -> Self {
            let inner = tonic::client::Grpc::new(channel);
            Self { inner }
        }
    }

    impl<T> EventsClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
    {
        pub fn with_origin(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }

        pub fn with_interceptor<F>(
            inner: T,
            interceptor: F,
        ) -> EventsClient<InterceptedService<T, F>>
        where
            F: tonic::service::Interceptor,
            T::ResponseBody: Default,
            T: tonic::codegen::Service<
                    http::Request<tonic::body::BoxBody>,
                    Response = http::Response<
                        <T as tonic::client::GrpcService<tonic::body::BoxBody>>::ResponseBody,
                    >,
                >,
            <T as tonic::codegen::Service<http::Request<tonic::body::BoxBody>>>::Error:
                Into<StdError> + std::marker::Send + std::marker::Sync,
        {
            EventsClient::with_origin(InterceptedService::new(inner, interceptor))
        }

        /// Open the server-streaming subscription.
        pub async fn subscribe(
            &mut self,
            request: impl tonic::IntoRequest<SubscribeRequest>,
        ) -> std::result::Result<
            tonic::Response<tonic::codec::Streaming<SubscribeResponse>>,
            tonic::Status,
        > {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/events.v1.EventsService/Subscribe");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("events.v1.EventsService", "Subscribe"));
            self.inner.server_streaming(req, path, codec).await
        }

        /// Acknowledge one delivered event.
        pub async fn ack(
            &mut self,
            request: impl tonic::IntoRequest<AckRequest>,
        ) -> std::result::Result<tonic::Response<AckResponse>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/events.v1.EventsService/Ack");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("events.v1.EventsService", "Ack"));
            self.inner.unary(req, path, codec).await
        }
    }
}

/// Generated-style gRPC server module, used by tests and mock servers.
pub mod events_server {
    use super::*;
    use tonic::codegen::*;

    /// Service trait for `events.v1.EventsService`.
    #[async_trait]
    pub trait Events: std::marker::Send + std::marker::Sync + 'static {
        /// Server streaming response type for the Subscribe method.
        type SubscribeStream: tonic::codegen::tokio_stream::Stream<
                Item = std::result::Result<SubscribeResponse, tonic::Status>,
            > + std::marker::Send
            + 'static;

        async fn subscribe(
            &self,
            request: tonic::Request<SubscribeRequest>,
        ) -> std::result::Result<tonic::Response<Self::SubscribeStream>, tonic::Status>;

        async fn ack(
            &self,
            request: tonic::Request<AckRequest>,
        ) -> std::result::Result<tonic::Response<AckResponse>, tonic::Status>;
    }

    #[derive(Debug)]
    pub struct EventsServer<T: Events> {
        inner: Arc<T>,
    }

    impl<T: Events> EventsServer<T> {
        pub fn new(inner: T) -> Self {
            Self {
                inner: Arc::new(inner),
            }
        }

        pub fn from_arc(inner: Arc<T>) -> Self {
            Self { inner }
        }
    }

    impl<T: Events> Clone for EventsServer<T> {
        fn clone(&self) -> Self {
            Self {
                inner: Arc::clone(&self.inner),
            }
        }
    }

    impl<T: Events> tonic::server::NamedService for EventsServer<T> {
        const NAME: &'static str = "events.v1.EventsService";
    }

    impl<T, B> tonic::codegen::Service<http::Request<B>> for EventsServer<T>
    where
        T: Events,
        B: Body + std::marker::Send + 'static,
        B::Error: Into<StdError> + std::marker::Send + 'static,
    {
        type Response = http::Response<tonic::body::BoxBody>;
        type Error = std::convert::Infallible;
        type Future = BoxFuture<Self::Response, Self::Error>;

        fn poll_ready(
            &mut self,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            let inner = Arc::clone(&self.inner);

            match req.uri().path() {
                "/events.v1.EventsService/Subscribe" => {
                    let fut = async move {
                        let mut grpc = tonic::server::Grpc::new(tonic::codec::ProstCodec::default());
                        let method = SubscribeSvc(inner);
                        let res = grpc.server_streaming(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/events.v1.EventsService/Ack" => {
                    let fut = async move {
                        let mut grpc = tonic::server::Grpc::new(tonic::codec::ProstCodec::default());
                        let method = AckSvc(inner);
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                _ => Box::pin(async move {
                    let mut response = http::Response::new(tonic::body::empty_body());
                    response.headers_mut().insert(
                        "grpc-status",
                        http::HeaderValue::from_static("12"),
                    );
                    response.headers_mut().insert(
                        "content-type",
                        http::HeaderValue::from_static("application/grpc"),
                    );
                    Ok(response)
                }),
            }
        }
    }

    struct SubscribeSvc<T: Events>(Arc<T>);

    impl<T: Events> tonic::server::ServerStreamingService<SubscribeRequest> for SubscribeSvc<T> {
        type Response = SubscribeResponse;
        type ResponseStream = T::SubscribeStream;
        type Future = BoxFuture<tonic::Response<Self::ResponseStream>, tonic::Status>;

        fn call(&mut self, request: tonic::Request<SubscribeRequest>) -> Self::Future {
            let inner = Arc::clone(&self.0);
            let fut = async move { inner.subscribe(request).await };
            Box::pin(fut)
        }
    }

    struct AckSvc<T: Events>(Arc<T>);

    impl<T: Events> tonic::server::UnaryService<AckRequest> for AckSvc<T> {
        type Response = AckResponse;
        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;

        fn call(&mut self, request: tonic::Request<AckRequest>) -> Self::Future {
            let inner = Arc::clone(&self.0);
            let fut = async move { inner.ack(request).await };
            Box::pin(fut)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message as _;

    #[test]
    fn subscribe_request_wire_round_trip() {
        let req = SubscribeRequest {
            types: vec!["roaming".to_string(), "handset_update".to_string()],
            durable_name: "my-durable".to_string(),
            queue_name: "my-queue".to_string(),
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

        let bytes = req.encode_to_vec();
        let decoded = SubscribeRequest::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, req);
        assert_eq!(decoded.start_position(), StartPosition::Oldest);
    }

    #[test]
    fn start_position_defaults_to_unspecified() {
        let req = SubscribeRequest::default();
        assert_eq!(req.start_position(), StartPosition::Unspecified);
    }

    #[test]
    fn event_carries_ack_metadata() {
        let event = Event {
            metadata: Some(EventMetadata {
                sequence: 7,
                ack_inbox: "inbox-7".to_string(),
                timestamp_ms: 1_700_000_000_000,
            }),
            event_type: "roaming".to_string(),
            payload: b"payload".to_vec(),
        };
        let bytes = event.encode_to_vec();
        let decoded = Event::decode(bytes.as_slice()).unwrap();
        let meta = decoded.metadata.unwrap();
        assert_eq!(meta.sequence, 7);
        assert_eq!(meta.ack_inbox, "inbox-7");
    }
}
