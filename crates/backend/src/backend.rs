use tokio::sync::broadcast;

use crate::chunk::StreamChunk;
use crate::error::ChatBackendError;
use crate::message::{ChatRequest, ChatResponse};

/// A type that represents a chat backend, which accepts sampling
/// requests and streams incremental chunks back over a shared channel.
///
/// Streaming is fire-and-forget: [`ChatBackend::stream_chat`] resolves
/// once the request has been accepted, and the resulting chunks arrive
/// on the channel obtained from [`ChatBackend::subscribe`], tagged with
/// the caller-supplied correlation id. Implementations must preserve
/// the emission order of chunks for a given correlation id.
///
/// Backends are never asked to abort an in-flight request. A caller
/// that loses interest simply stops consuming the chunks; the backend
/// should run the request to its natural end.
pub trait ChatBackend: Send + Sync + 'static {
    /// The error type that may be returned by the backend.
    type Error: ChatBackendError;

    /// Subscribes to the chunk channel.
    ///
    /// Callers should subscribe *before* issuing the request they want
    /// to observe, otherwise early chunks may be missed.
    fn subscribe(&self) -> broadcast::Receiver<StreamChunk>;

    /// Issues a streaming request tagged with `correlation_id`.
    ///
    /// An `Err` return means the backend could not be reached at all;
    /// errors occurring mid-stream are delivered as error chunks.
    fn stream_chat(
        &self,
        req: &ChatRequest,
        correlation_id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static;

    /// Sends a request and waits for the complete response.
    fn chat(
        &self,
        req: &ChatRequest,
    ) -> impl Future<Output = Result<ChatResponse, Self::Error>> + Send + 'static;
}
