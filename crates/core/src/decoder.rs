//! Incremental decoding of one streaming backend response.
//!
//! A decoder run subscribes to the backend's chunk channel, issues the
//! request, and folds the matching chunks into a terminal outcome. Every
//! chunk is checked against the request epoch before it is applied, so a
//! cancelled or superseded run resolves to [`StreamOutcome::Stale`]
//! without touching the conversation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use glimpse_backend::{
    ChatMessage, ChatRequest, ErrorKind as BackendErrorKind, ToolCall,
};
use tokio::sync::broadcast::error::RecvError;

use crate::backend_client::BackendClient;
use crate::conversation::StreamToken;
use crate::epoch::Epoch;
use crate::error::ChatError;
use crate::orchestrator::state::StateHandle;
use crate::thinking;

static NEXT_STREAM_SEQ: AtomicU64 = AtomicU64::new(0);

/// A normally completed assistant turn.
pub(crate) struct AssistantTurn {
    pub message: ChatMessage,
    pub thinking: Option<String>,
    pub thinking_duration: Option<Duration>,
    pub stream_token: Option<StreamToken>,
}

/// The terminal outcome of one decoder run.
pub(crate) enum StreamOutcome {
    /// The epoch moved during the run; everything was discarded.
    Stale,
    /// The model produced a complete assistant message.
    Assistant(AssistantTurn),
    /// The model wants tools invoked before it can answer.
    ToolCalls(Vec<ToolCall>),
}

/// Runs one streaming request to its terminal outcome.
pub(crate) async fn run_stream(
    client: &BackendClient,
    state: &StateHandle,
    req: ChatRequest,
    epoch: Epoch,
) -> Result<StreamOutcome, ChatError> {
    let correlation_id = next_correlation_id();
    // Subscribe before issuing the request, or early chunks are lost.
    let mut rx = client.subscribe();
    if let Err(err) = client.stream_chat(req, correlation_id.clone()).await
    {
        return Err(match err.kind() {
            BackendErrorKind::Unreachable => {
                ChatError::backend_unreachable(err.to_string())
            }
            _ => ChatError::backend(err.to_string()),
        });
    }

    let started_at = Instant::now();
    let mut token: Option<StreamToken> = None;
    let mut content = String::new();
    let mut streamed_thinking: Option<String> = None;
    let mut first_signal_latency: Option<Duration> = None;

    loop {
        let chunk = match rx.recv().await {
            Ok(chunk) => chunk,
            Err(RecvError::Lagged(skipped)) => {
                warn!("chunk channel lagged, skipped {skipped} chunks");
                continue;
            }
            Err(RecvError::Closed) => {
                discard_placeholder(state, token);
                return Err(ChatError::backend("chunk channel closed"));
            }
        };

        // Staleness first: a superseded run must not observe anything.
        if !state.is_current(epoch) {
            discard_placeholder(state, token);
            return Ok(StreamOutcome::Stale);
        }
        if chunk.correlation_id != correlation_id {
            continue;
        }
        if let Some(error) = chunk.error {
            discard_placeholder(state, token);
            return Err(ChatError::backend(error));
        }

        if let Some(delta) = &chunk.message {
            let fragment = delta.reasoning_fragment();
            let has_signal = fragment.is_some()
                || delta.content.as_deref().is_some_and(|c| !c.is_empty());
            if has_signal && first_signal_latency.is_none() {
                first_signal_latency = Some(started_at.elapsed());
            }
            if let Some(fragment) = fragment {
                streamed_thinking = Some(thinking::merge_stream_text(
                    streamed_thinking.as_deref(),
                    fragment,
                ));
            }
            if !delta.tool_calls.is_empty() {
                // Terminal for this stream; the placeholder never
                // becomes a visible message.
                discard_placeholder(state, token);
                return Ok(StreamOutcome::ToolCalls(
                    delta.tool_calls.clone(),
                ));
            }
            if let Some(piece) = &delta.content {
                content.push_str(piece);
            }

            if !content.is_empty() || streamed_thinking.is_some() {
                let display_thinking = thinking::normalize_thinking(
                    streamed_thinking.as_deref(),
                );
                let current = match token {
                    Some(token) => Some(token),
                    None => {
                        token = state.begin_streaming(epoch);
                        if token.is_none() {
                            return Ok(StreamOutcome::Stale);
                        }
                        token
                    }
                };
                if let Some(current) = current {
                    state.update_streaming(
                        epoch,
                        current,
                        &content,
                        display_thinking,
                    );
                }
            }
        }

        if chunk.done {
            let finalized = thinking::finalize_assistant(
                &content,
                streamed_thinking.as_deref(),
            );
            let (message, chosen_thinking) = match finalized {
                Ok(finalized) => finalized,
                Err(err) => {
                    discard_placeholder(state, token);
                    return Err(err);
                }
            };
            debug!(
                "stream completed, content: {} bytes, thinking: {}",
                message.content.len(),
                chosen_thinking.is_some(),
            );
            return Ok(StreamOutcome::Assistant(AssistantTurn {
                message,
                thinking: chosen_thinking,
                thinking_duration: first_signal_latency,
                stream_token: token,
            }));
        }
    }
}

fn discard_placeholder(state: &StateHandle, token: Option<StreamToken>) {
    if let Some(token) = token {
        state.remove_streaming(token);
    }
}

fn next_correlation_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let seq = NEXT_STREAM_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("stream-{millis}-{seq}")
}
