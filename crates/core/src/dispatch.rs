//! Execution of one batch of tool calls requested by the model.

use std::sync::Arc;

use glimpse_backend::{ChatMessage, ToolCall};
use serde_json::{Value, json};

use crate::epoch::Epoch;
use crate::error::ChatError;
use crate::orchestrator::state::StateHandle;
use crate::tool::{
    ActionHooks, ConsentProvider, Registry, ToolAttachment,
};

/// The outcome of one dispatched batch.
pub(crate) enum BatchOutcome {
    /// The epoch moved while the batch ran; nothing was committed.
    Stale,
    /// The batch completed and the follow-up request is ready.
    Continue {
        /// Whether an image attachment rode along with the results.
        has_image_attachment: bool,
    },
}

pub(crate) struct Dispatcher<'a> {
    pub registry: &'a Registry,
    pub state: &'a StateHandle,
    pub consent: Option<&'a dyn ConsentProvider>,
    pub hooks: Option<&'a dyn ActionHooks>,
    pub tools_enabled: bool,
}

impl Dispatcher<'_> {
    /// Runs every call in the batch, commits the exchange to the
    /// history, and extends `request_messages` for the follow-up
    /// request.
    ///
    /// The usage indicator is reset on every exit path, stale and
    /// failed ones included.
    pub async fn dispatch(
        &self,
        epoch: Epoch,
        calls: Vec<ToolCall>,
        request_messages: &mut Vec<ChatMessage>,
    ) -> Result<BatchOutcome, ChatError> {
        let batch_name = calls
            .first()
            .map(|call| call.name.clone())
            .unwrap_or_default();
        self.state.tool_started(epoch, &batch_name);
        let result = self.run_batch(epoch, calls, request_messages).await;
        self.state.tool_finished(&batch_name);
        result
    }

    async fn run_batch(
        &self,
        epoch: Epoch,
        calls: Vec<ToolCall>,
        request_messages: &mut Vec<ChatMessage>,
    ) -> Result<BatchOutcome, ChatError> {
        let mut exchange = Vec::with_capacity(calls.len() + 1);
        exchange.push(ChatMessage::assistant_tool_calls(calls.clone()));

        let mut attachment: Option<ToolAttachment> = None;
        for call in &calls {
            debug!("dispatching tool call: {}", call.name);
            let (payload, call_attachment) = self.run_call(call).await?;
            exchange
                .push(ChatMessage::tool(&call.name, payload.to_string()));
            if call_attachment.is_some() {
                attachment = call_attachment;
            }
        }

        // The exchange joins the history only if the turn is still
        // live; the attachment prompt stays request-only either way.
        if !self.state.append_history(epoch, exchange.clone()) {
            return Ok(BatchOutcome::Stale);
        }
        request_messages.extend(exchange);

        let mut has_image_attachment = false;
        if let Some(attachment) = attachment {
            has_image_attachment = !attachment.images.is_empty();
            request_messages.push(
                ChatMessage::user(attachment.prompt)
                    .with_images(attachment.images),
            );
        }
        strip_stale_images(request_messages);

        Ok(BatchOutcome::Continue {
            has_image_attachment,
        })
    }

    /// Runs a single call to a serialized result payload. `Err` is
    /// fatal to the turn; refusals come back as `Ok` payloads the
    /// model can read.
    async fn run_call(
        &self,
        call: &ToolCall,
    ) -> Result<(Value, Option<ToolAttachment>), ChatError> {
        let Some(tool) = self.registry.get(&call.name) else {
            return Err(ChatError::unsupported_tool(&call.name));
        };

        if !self.tools_enabled {
            return Ok((disabled_payload(&call.name), None));
        }
        if tool.requires_consent() {
            let Some(provider) = self.consent else {
                // Consent-gated tools are unusable without a provider.
                return Ok((disabled_payload(&call.name), None));
            };
            let consent = provider
                .request_consent()
                .await
                .map_err(|err| ChatError::consent(err.to_string()))?;
            if !consent.approved {
                info!("user declined tool call: {}", call.name);
                return Ok((json!({ "error": "declined" }), None));
            }
        }

        let hooks = self.hooks.filter(|_| tool.hides_host_ui());
        if let Some(hooks) = hooks {
            if let Err(err) = hooks.before_action().await {
                warn!("before_action hook failed: {err}");
            }
        }
        let result =
            Arc::clone(tool).execute(call.arguments.clone()).await;
        if let Some(hooks) = hooks {
            if let Err(err) = hooks.after_action().await {
                warn!("after_action hook failed: {err}");
            }
        }

        match result {
            Ok(output) => Ok((output.content, output.attachment)),
            Err(err) => Err(ChatError::tool_failed(format!(
                "{}: {err}",
                call.name
            ))),
        }
    }
}

fn disabled_payload(name: &str) -> Value {
    json!({ "error": format!("{name} is disabled.") })
}

/// Drops image payloads from every message but the last one. Stale
/// images only inflate the request; the model already answered them.
pub(crate) fn strip_stale_images(messages: &mut [ChatMessage]) {
    let last = messages.len().saturating_sub(1);
    for message in &mut messages[..last] {
        message.images.clear();
    }
}
