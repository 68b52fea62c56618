use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::{GenerationRequest, ResponseEvent};

pub type ResponseStream = Pin<Box<dyn Stream<Item = anyhow::Result<ResponseEvent>> + Send>>;

/// Transport seam between the engine and a model backend.
///
/// Implementations translate a [`GenerationRequest`] into whatever wire
/// format their backend speaks and surface the reply as a stream of
/// [`ResponseEvent`]s.  An `Err` from `generate` is a transport failure and
/// aborts the calling run; recoverable mid-stream problems should be emitted
/// as `ResponseEvent::Error` instead.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Human-readable gateway name for status display.
    fn name(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Send a generation request and return a streaming response.
    async fn generate(&self, req: GenerationRequest) -> anyhow::Result<ResponseStream>;
}
