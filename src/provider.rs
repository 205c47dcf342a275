use bytes::Bytes;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::models::{CompletionRequest, CompletionResponse};

/// Raw response body chunks, in arrival order. Transport failures are
/// already mapped to `RelayError::UpstreamError`.
pub type ProviderStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Type alias for the future returned by stream_completion
pub type StreamFuture = Pin<Box<dyn Future<Output = Result<ProviderStream>> + Send>>;

/// Type alias for the future returned by complete
pub type CompleteFuture = Pin<Box<dyn Future<Output = Result<CompletionResponse>> + Send>>;

/// Upstream text-completion service
pub trait Provider: Send + Sync {
    /// Issue one streaming request and expose the response body.
    ///
    /// Resolves to an error, rather than an empty stream, when the
    /// connection fails or the upstream answers with a non-success status.
    fn stream_completion(&self, request: CompletionRequest) -> StreamFuture;

    /// Issue one request and wait for the whole document
    fn complete(&self, request: CompletionRequest) -> CompleteFuture;

    /// Get the provider name for logging
    fn name(&self) -> &str;
}
