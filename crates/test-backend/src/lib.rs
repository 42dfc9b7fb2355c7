//! A local fake chat backend for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use glimpse_backend::{
    AssistantDelta, ChatBackend, ChatBackendError, ChatMessage,
    ChatRequest, ChatResponse, ErrorKind, StreamChunk,
};
use tokio::sync::broadcast;
use tokio::time::sleep;

pub use preset::*;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Error {
    fn unscripted() -> Self {
        Self {
            message: "no scripted response for this request",
            kind: ErrorKind::Unreachable,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ChatBackendError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

struct Inner {
    script: Mutex<VecDeque<PresetResponse>>,
    requests: Mutex<Vec<ChatRequest>>,
    delay: Mutex<Option<Duration>>,
    tx: broadcast::Sender<StreamChunk>,
}

/// A local fake chat backend for testing purpose.
///
/// Before sending requests, you need to set up the script, which is
/// how the backend should respond. Scripted responses are consumed in
/// FIFO order, one per streaming request; an unscripted request is
/// rejected as if the backend were unreachable.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy
/// memory copies involved. You should only use it for testing.
#[derive(Clone)]
pub struct TestBackend {
    inner: Arc<Inner>,
}

impl Default for TestBackend {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                script: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
                delay: Mutex::new(None),
                tx,
            }),
        }
    }
}

impl TestBackend {
    /// Appends a scripted response.
    #[inline]
    pub fn push_response(&self, preset: PresetResponse) {
        lock(&self.inner.script).push_back(preset);
    }

    /// Sets a delay inserted before every emitted chunk.
    #[inline]
    pub fn set_delay(&self, duration: Duration) {
        *lock(&self.inner.delay) = Some(duration);
    }

    /// Returns every request received so far.
    #[inline]
    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.inner.requests).clone()
    }
}

impl ChatBackend for TestBackend {
    type Error = crate::Error;

    fn subscribe(&self) -> broadcast::Receiver<StreamChunk> {
        self.inner.tx.subscribe()
    }

    fn stream_chat(
        &self,
        req: &ChatRequest,
        correlation_id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static
    {
        let inner = Arc::clone(&self.inner);
        let req = req.clone();
        let correlation_id = correlation_id.to_owned();
        async move {
            lock(&inner.requests).push(req);
            let Some(preset) = lock(&inner.script).pop_front() else {
                return Err(Error::unscripted());
            };
            let delay = *lock(&inner.delay);
            let tx = inner.tx.clone();
            tokio::spawn(async move {
                emit_preset(&tx, &correlation_id, preset, delay).await;
            });
            Ok(())
        }
    }

    fn chat(
        &self,
        req: &ChatRequest,
    ) -> impl Future<Output = Result<ChatResponse, Self::Error>>
    + Send
    + 'static {
        let inner = Arc::clone(&self.inner);
        let req = req.clone();
        async move {
            lock(&inner.requests).push(req);
            let Some(preset) = lock(&inner.script).pop_front() else {
                return Err(Error::unscripted());
            };
            let mut content = String::new();
            let mut tool_calls = Vec::new();
            for event in preset.events {
                match event {
                    PresetEvent::ContentDelta(piece) => {
                        content.push_str(&piece);
                    }
                    PresetEvent::ReasoningDelta(_) => {}
                    PresetEvent::ToolCall(call) => tool_calls.push(call),
                    PresetEvent::Error(_) => {
                        return Err(Error {
                            message: "scripted error",
                            kind: ErrorKind::Other,
                        });
                    }
                }
            }
            let message = if tool_calls.is_empty() {
                ChatMessage::assistant(content)
            } else {
                ChatMessage::assistant_tool_calls(tool_calls)
            };
            Ok(ChatResponse {
                message: Some(message),
            })
        }
    }
}

async fn emit_preset(
    tx: &broadcast::Sender<StreamChunk>,
    correlation_id: &str,
    preset: PresetResponse,
    delay: Option<Duration>,
) {
    for event in preset.events {
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        let chunk = match event {
            PresetEvent::ContentDelta(piece) => StreamChunk::delta(
                correlation_id,
                AssistantDelta::content(piece),
            ),
            PresetEvent::ReasoningDelta(piece) => StreamChunk::delta(
                correlation_id,
                AssistantDelta::reasoning(piece),
            ),
            PresetEvent::ToolCall(call) => StreamChunk::delta(
                correlation_id,
                AssistantDelta::tool_calls(vec![call]),
            ),
            PresetEvent::Error(message) => {
                tx.send(StreamChunk::error(correlation_id, message)).ok();
                return;
            }
        };
        if tx.send(chunk).is_err() {
            return;
        }
    }
    tx.send(StreamChunk::done(correlation_id)).ok();
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
