use crate::error::Result;
use crate::message::{RawRequest, RawResponse};

/// Serves inbound calls for one endpoint
///
/// Handlers are registered on a `ServiceChannel` so an inbound server can
/// look them up; this crate does not dispatch to them itself.
#[async_trait::async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, request: RawRequest) -> Result<RawResponse>;
}
