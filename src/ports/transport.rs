use crate::error::TransportError;
use crate::push::PushRequest;

use async_trait::async_trait;

/// Outbound HTTP hop to a push service.
///
/// Returns the raw response status so the dispatcher owns classification;
/// only network-level failures map to [`TransportError`].
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn post(&self, request: &PushRequest) -> Result<u16, TransportError>;
}
