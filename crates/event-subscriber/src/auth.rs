//! Per-call credential decoration.

use tonic::metadata::MetadataValue;
use tonic::service::Interceptor;
use tonic::{Request, Status};

use crate::types::TokenProvider;

/// Interceptor that injects `authorization: Bearer <token>` into every
/// outgoing call, using the provider's latest value at send time.
///
/// Without a provider, calls pass through unauthenticated. A failing
/// provider turns the call into an `UNAUTHENTICATED` error, which the
/// retry loop treats like any other rejected credential.
#[derive(Clone)]
pub struct BearerAuth {
    provider: Option<TokenProvider>,
}

impl BearerAuth {
    pub(crate) fn new(provider: Option<TokenProvider>) -> Self {
        Self { provider }
    }
}

impl Interceptor for BearerAuth {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let Some(provider) = &self.provider else {
            return Ok(request);
        };
        let token = provider()
            .map_err(|e| Status::unauthenticated(format!("token provider failed: {e}")))?;
        let value = MetadataValue::try_from(format!("Bearer {token}"))
            .map_err(|_| Status::unauthenticated("bearer token is not a valid header value"))?;
        request.metadata_mut().insert("authorization", value);
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tonic::Code;

    #[test]
    fn no_provider_passes_through() {
        let mut auth = BearerAuth::new(None);
        let request = auth.call(Request::new(())).unwrap();
        assert!(request.metadata().get("authorization").is_none());
    }

    #[test]
    fn provider_token_is_injected() {
        let provider: TokenProvider = Arc::new(|| Ok("t0k3n".to_string()));
        let mut auth = BearerAuth::new(Some(provider));
        let request = auth.call(Request::new(())).unwrap();
        let value = request.metadata().get("authorization").unwrap();
        assert_eq!(value.to_str().unwrap(), "Bearer t0k3n");
    }

    #[test]
    fn provider_failure_maps_to_unauthenticated() {
        let provider: TokenProvider = Arc::new(|| Err("token endpoint down".into()));
        let mut auth = BearerAuth::new(Some(provider));
        let status = auth.call(Request::new(())).unwrap_err();
        assert_eq!(status.code(), Code::Unauthenticated);
    }

    #[test]
    fn invalid_token_maps_to_unauthenticated() {
        let provider: TokenProvider = Arc::new(|| Ok("bad\ntoken".to_string()));
        let mut auth = BearerAuth::new(Some(provider));
        let status = auth.call(Request::new(())).unwrap_err();
        assert_eq!(status.code(), Code::Unauthenticated);
    }
}
