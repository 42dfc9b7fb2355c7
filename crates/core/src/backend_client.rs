use std::pin::Pin;
use std::sync::Arc;

use glimpse_backend::{
    ChatBackend, ChatBackendError, ChatRequest, StreamChunk,
};
use tokio::sync::broadcast;
use tracing::Instrument;

type StreamRequestResult = Result<(), Box<dyn ChatBackendError>>;
type BoxedStreamRequestFuture =
    Pin<Box<dyn Future<Output = StreamRequestResult> + Send>>;
#[rustfmt::skip]
type StreamFn = Arc<
    dyn Fn(ChatRequest, String) -> BoxedStreamRequestFuture + Send + Sync
>;
type SubscribeFn =
    Arc<dyn Fn() -> broadcast::Receiver<StreamChunk> + Send + Sync>;

/// A wrapper around a chat backend that provides a type-erased
/// interface for the other modules.
#[derive(Clone)]
pub(crate) struct BackendClient {
    stream_fn: StreamFn,
    subscribe_fn: SubscribeFn,
}

impl BackendClient {
    pub fn new<B: ChatBackend>(backend: B) -> Self {
        // We have to erase the type `B`, since `BackendClient` doesn't
        // have a generic parameter and we don't want it either.
        let backend = Arc::new(backend);
        let stream_fn: StreamFn = {
            let backend = Arc::clone(&backend);
            Arc::new(move |req, correlation_id| {
                let fut = backend.stream_chat(&req, &correlation_id);
                Box::pin(
                    async move {
                        trace!("issuing a stream request: {req:?}");
                        match fut.await {
                            Ok(()) => Ok(()),
                            Err(err) => {
                                error!("got an error: {err:?}");
                                Err(Box::new(err)
                                    as Box<dyn ChatBackendError>)
                            }
                        }
                    }
                    .instrument(trace_span!("backend stream req")),
                )
            })
        };
        let subscribe_fn: SubscribeFn =
            Arc::new(move || backend.subscribe());
        Self {
            stream_fn,
            subscribe_fn,
        }
    }

    /// Subscribes to the backend's chunk channel.
    #[inline]
    pub fn subscribe(&self) -> broadcast::Receiver<StreamChunk> {
        (self.subscribe_fn)()
    }

    /// Issues a fire-and-forget streaming request.
    #[inline]
    pub async fn stream_chat(
        &self,
        req: ChatRequest,
        correlation_id: String,
    ) -> StreamRequestResult {
        (self.stream_fn)(req, correlation_id).await
    }
}
