use std::future::ready;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use glimpse_backend::{ImageRef, Role, ToolCall};
use glimpse_test_backend::{PresetEvent, PresetResponse, TestBackend};
use serde_json::{Value, json};
use tokio::time::sleep;

use crate::OrchestratorBuilder;
use crate::tool::{
    ActionHooks, Consent, ConsentError, ConsentProvider, Tool,
    ToolOutput, ToolResult,
};

static ECHO_SCHEMA: &Value = &Value::Null;

struct EchoTool {
    consent_gated: bool,
    hides_ui: bool,
    attachment_images: Vec<ImageRef>,
}

impl EchoTool {
    fn plain() -> Self {
        Self {
            consent_gated: false,
            hides_ui: false,
            attachment_images: vec![],
        }
    }

    fn consent_gated() -> Self {
        Self {
            consent_gated: true,
            ..Self::plain()
        }
    }
}

impl Tool for EchoTool {
    type Input = Value;

    fn name(&self) -> &str {
        "echo_tool"
    }

    fn description(&self) -> &str {
        "Echoes its input back."
    }

    fn parameter_schema(&self) -> &Value {
        ECHO_SCHEMA
    }

    fn requires_consent(&self) -> bool {
        self.consent_gated
    }

    fn hides_host_ui(&self) -> bool {
        self.hides_ui
    }

    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let mut output = ToolOutput::content(json!({ "echoed": input }));
        if !self.attachment_images.is_empty() {
            output = output.with_attachment(
                "Here is the captured image.",
                self.attachment_images.clone(),
            );
        }
        ready(Ok(output))
    }
}

struct FailingTool;

impl Tool for FailingTool {
    type Input = Value;

    fn name(&self) -> &str {
        "failing_tool"
    }

    fn description(&self) -> &str {
        "Always fails."
    }

    fn parameter_schema(&self) -> &Value {
        ECHO_SCHEMA
    }

    fn execute(
        &self,
        _input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        ready(Err(crate::tool::Error::execution_error()
            .with_reason("disk on fire")))
    }
}

struct ScriptedConsent {
    approved: bool,
}

#[async_trait]
impl ConsentProvider for ScriptedConsent {
    async fn request_consent(&self) -> Result<Consent, ConsentError> {
        Ok(Consent {
            approved: self.approved,
        })
    }
}

#[derive(Default)]
struct CountingHooks {
    before: AtomicUsize,
    after: AtomicUsize,
}

#[async_trait]
impl ActionHooks for Arc<CountingHooks> {
    async fn before_action(&self) -> Result<(), String> {
        self.before.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn after_action(&self) -> Result<(), String> {
        self.after.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn echo_call() -> PresetEvent {
    PresetEvent::ToolCall(ToolCall {
        name: "echo_tool".to_owned(),
        arguments: json!({ "value": 42 }),
    })
}

#[tokio::test]
async fn test_simple_turn() {
    let backend = TestBackend::default();
    backend.push_response(PresetResponse::with_events([
        PresetEvent::ContentDelta("Hi, ".to_owned()),
        PresetEvent::ContentDelta("what can I do for you?".to_owned()),
    ]));

    let orchestrator =
        OrchestratorBuilder::with_backend(backend).build();
    orchestrator.submit("Hello").await;

    assert!(!orchestrator.is_sending());
    assert_eq!(orchestrator.last_error(), None);
    let history = orchestrator.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "Hello");
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content, "Hi, what can I do for you?");

    let display = orchestrator.display_messages();
    assert_eq!(display.len(), 2);
    assert!(display.iter().all(|m| m.stream_token.is_none()));
}

#[tokio::test]
async fn test_blank_submission_is_ignored() {
    let backend = TestBackend::default();
    let orchestrator =
        OrchestratorBuilder::with_backend(backend).build();
    orchestrator.submit("   \n").await;
    assert!(orchestrator.history().is_empty());
    assert_eq!(orchestrator.last_error(), None);
}

#[tokio::test]
async fn test_reasoning_is_merged_and_displayed() {
    let backend = TestBackend::default();
    backend.push_response(PresetResponse::with_events([
        PresetEvent::ReasoningDelta("The user greets".to_owned()),
        PresetEvent::ReasoningDelta(
            "The user greets me. I reply.".to_owned(),
        ),
        PresetEvent::ContentDelta("Hello!".to_owned()),
    ]));

    let orchestrator =
        OrchestratorBuilder::with_backend(backend).build();
    orchestrator.submit("Hi").await;

    let display = orchestrator.display_messages();
    let answer = display.last().unwrap();
    assert_eq!(answer.message.content, "Hello!");
    // Cumulative fragment replaced the shorter prefix.
    assert_eq!(
        answer.thinking.as_deref(),
        Some("The user greets me. I reply.")
    );
    assert!(answer.thinking_duration.is_some());

    // Thinking stays out of the authoritative history.
    let history = orchestrator.history();
    assert_eq!(history[1].content, "Hello!");
}

#[tokio::test]
async fn test_inline_thinking_tags_are_extracted() {
    let backend = TestBackend::default();
    backend.push_response(PresetResponse::with_events([
        PresetEvent::ContentDelta(
            "<think>weighing options</think>Go left.".to_owned(),
        ),
    ]));

    let orchestrator =
        OrchestratorBuilder::with_backend(backend).build();
    orchestrator.submit("Which way?").await;

    let history = orchestrator.history();
    assert_eq!(history[1].content, "Go left.");
    let display = orchestrator.display_messages();
    assert_eq!(
        display.last().unwrap().thinking.as_deref(),
        Some("weighing options")
    );
}

#[tokio::test]
async fn test_empty_completion_is_an_error() {
    let backend = TestBackend::default();
    backend.push_response(PresetResponse { events: vec![] });

    let orchestrator =
        OrchestratorBuilder::with_backend(backend).build();
    orchestrator.submit("Hello").await;

    assert!(!orchestrator.is_sending());
    assert!(orchestrator.last_error().is_some());
    // The user message stays; no assistant entry was committed.
    let history = orchestrator.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Role::User);
}

#[tokio::test]
async fn test_reasoning_only_completion_is_valid() {
    let backend = TestBackend::default();
    backend.push_response(PresetResponse::with_events([
        PresetEvent::ReasoningDelta(
            "I have nothing to say out loud.".to_owned(),
        ),
    ]));

    let orchestrator =
        OrchestratorBuilder::with_backend(backend).build();
    orchestrator.submit("Hello").await;

    assert_eq!(orchestrator.last_error(), None);
    let display = orchestrator.display_messages();
    let answer = display.last().unwrap();
    assert_eq!(answer.message.content, "");
    assert!(answer.thinking.is_some());
}

#[tokio::test]
async fn test_cancel_leaves_no_orphan_assistant() {
    let backend = TestBackend::default();
    backend.set_delay(Duration::from_millis(50));
    backend.push_response(PresetResponse::with_events([
        PresetEvent::ContentDelta("You won't ".to_owned()),
        PresetEvent::ContentDelta("see this.".to_owned()),
    ]));

    let orchestrator =
        OrchestratorBuilder::with_backend(backend).build();
    let turn = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.submit("hi").await })
    };
    sleep(Duration::from_millis(10)).await;
    assert!(orchestrator.is_sending());
    orchestrator.cancel();
    assert!(!orchestrator.is_sending());
    turn.await.unwrap();

    let history = orchestrator.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content, "hi");
    assert_eq!(orchestrator.last_error(), None);
    // No streaming placeholder survives the cancel.
    assert!(
        orchestrator
            .display_messages()
            .iter()
            .all(|m| m.stream_token.is_none())
    );
}

#[tokio::test]
async fn test_cancel_while_idle_is_a_no_op() {
    let backend = TestBackend::default();
    let orchestrator =
        OrchestratorBuilder::with_backend(backend).build();
    orchestrator.cancel();
    assert!(!orchestrator.is_sending());
}

#[tokio::test]
async fn test_regenerate_resubmits_without_duplicating() {
    let backend = TestBackend::default();
    backend.push_response(PresetResponse::with_events([
        PresetEvent::ContentDelta("First answer.".to_owned()),
    ]));
    backend.push_response(PresetResponse::with_events([
        PresetEvent::ContentDelta("Second answer.".to_owned()),
    ]));

    let orchestrator = OrchestratorBuilder::with_backend(backend.clone())
        .build();
    orchestrator.submit("x").await;
    assert!(orchestrator.can_regenerate());
    orchestrator.regenerate_last().await;

    let history = orchestrator.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "x");
    assert_eq!(history[1].content, "Second answer.");
    let user_turns = history
        .iter()
        .filter(|m| m.role == Role::User)
        .count();
    assert_eq!(user_turns, 1);

    // The regenerated request carried the same single user message.
    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages.len(), 1);
    assert_eq!(requests[1].messages[0].content, "x");
}

#[tokio::test]
async fn test_regenerate_on_empty_history_is_a_no_op() {
    let backend = TestBackend::default();
    let orchestrator =
        OrchestratorBuilder::with_backend(backend).build();
    assert!(!orchestrator.can_regenerate());
    orchestrator.regenerate_last().await;
    assert!(orchestrator.history().is_empty());
}

#[tokio::test]
async fn test_tool_round_trip() {
    let backend = TestBackend::default();
    backend.push_response(PresetResponse::with_events([echo_call()]));
    backend.push_response(PresetResponse::with_events([
        PresetEvent::ContentDelta("The echo said 42.".to_owned()),
    ]));

    let orchestrator = OrchestratorBuilder::with_backend(backend.clone())
        .with_tool(EchoTool::plain())
        .build();
    orchestrator.submit("Use the tool").await;

    assert_eq!(orchestrator.last_error(), None);
    let history = orchestrator.history();
    assert_eq!(history.len(), 4);
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].tool_calls.len(), 1);
    assert_eq!(history[2].role, Role::Tool);
    assert_eq!(history[2].tool_name.as_deref(), Some("echo_tool"));
    assert!(history[2].content.contains("\"echoed\""));
    assert_eq!(history[3].content, "The echo said 42.");

    // The follow-up request carried the tool exchange.
    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages.len(), 3);
    assert_eq!(requests[1].messages[1].role, Role::Assistant);
    assert_eq!(requests[1].messages[2].role, Role::Tool);

    let usage = orchestrator.tool_usage();
    assert!(!usage.in_progress);
    assert_eq!(usage.name.as_deref(), Some("echo_tool"));
    assert!(usage.last_used_at.is_some());

    // The finalized answer carries the activity label.
    let display = orchestrator.display_messages();
    assert_eq!(
        display.last().unwrap().tool_activity.as_deref(),
        Some("Using echo tool.")
    );
}

#[tokio::test]
async fn test_unsupported_tool_fails_the_turn() {
    let backend = TestBackend::default();
    backend.push_response(PresetResponse::with_events([
        PresetEvent::ToolCall(ToolCall {
            name: "no_such_tool".to_owned(),
            arguments: json!({}),
        }),
    ]));

    let orchestrator =
        OrchestratorBuilder::with_backend(backend).build();
    orchestrator.submit("Use the tool").await;

    let error = orchestrator.last_error().unwrap();
    assert!(error.contains("no_such_tool"));
    // Only the user message survives a failed turn.
    assert_eq!(orchestrator.history().len(), 1);
}

#[tokio::test]
async fn test_disabled_tools_are_refused() {
    let backend = TestBackend::default();
    backend.push_response(PresetResponse::with_events([echo_call()]));
    backend.push_response(PresetResponse::with_events([
        PresetEvent::ContentDelta("Understood.".to_owned()),
    ]));

    let orchestrator = OrchestratorBuilder::with_backend(backend)
        .with_tool(EchoTool::plain())
        .with_tools_enabled(false)
        .build();
    orchestrator.submit("Use the tool").await;

    assert_eq!(orchestrator.last_error(), None);
    let history = orchestrator.history();
    assert_eq!(history[2].role, Role::Tool);
    assert!(history[2].content.contains("echo_tool is disabled."));
}

#[tokio::test]
async fn test_consent_denial_is_not_an_error() {
    let backend = TestBackend::default();
    backend.push_response(PresetResponse::with_events([echo_call()]));
    backend.push_response(PresetResponse::with_events([
        PresetEvent::ContentDelta("Fair enough.".to_owned()),
    ]));

    let orchestrator = OrchestratorBuilder::with_backend(backend)
        .with_tool(EchoTool::consent_gated())
        .with_consent_provider(ScriptedConsent { approved: false })
        .build();
    orchestrator.submit("Capture my screen").await;

    assert_eq!(orchestrator.last_error(), None);
    let history = orchestrator.history();
    assert!(history[2].content.contains("declined"));
    assert_eq!(history[3].content, "Fair enough.");
}

#[tokio::test]
async fn test_consent_gated_tool_without_provider_is_refused() {
    let backend = TestBackend::default();
    backend.push_response(PresetResponse::with_events([echo_call()]));
    backend.push_response(PresetResponse::with_events([
        PresetEvent::ContentDelta("Okay.".to_owned()),
    ]));

    let orchestrator = OrchestratorBuilder::with_backend(backend)
        .with_tool(EchoTool::consent_gated())
        .build();
    orchestrator.submit("Capture my screen").await;

    assert_eq!(orchestrator.last_error(), None);
    let history = orchestrator.history();
    assert!(history[2].content.contains("echo_tool is disabled."));
}

#[tokio::test]
async fn test_hooks_wrap_ui_hiding_tools() {
    let backend = TestBackend::default();
    backend.push_response(PresetResponse::with_events([echo_call()]));
    backend.push_response(PresetResponse::with_events([
        PresetEvent::ContentDelta("Done.".to_owned()),
    ]));

    let hooks = Arc::new(CountingHooks::default());
    let orchestrator = OrchestratorBuilder::with_backend(backend)
        .with_tool(EchoTool {
            hides_ui: true,
            ..EchoTool::plain()
        })
        .with_consent_provider(ScriptedConsent { approved: true })
        .with_action_hooks(Arc::clone(&hooks))
        .build();
    orchestrator.submit("Go").await;

    assert_eq!(orchestrator.last_error(), None);
    assert_eq!(hooks.before.load(Ordering::SeqCst), 1);
    assert_eq!(hooks.after.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failing_tool_fails_the_turn() {
    let backend = TestBackend::default();
    backend.push_response(PresetResponse::with_events([
        PresetEvent::ToolCall(ToolCall {
            name: "failing_tool".to_owned(),
            arguments: json!({}),
        }),
    ]));

    let orchestrator = OrchestratorBuilder::with_backend(backend)
        .with_tool(FailingTool)
        .build();
    orchestrator.submit("Try it").await;

    let error = orchestrator.last_error().unwrap();
    assert!(error.contains("disk on fire"));
    let usage = orchestrator.tool_usage();
    assert!(!usage.in_progress);
}

#[tokio::test]
async fn test_tool_loop_is_bounded() {
    let backend = TestBackend::default();
    for _ in 0..3 {
        backend
            .push_response(PresetResponse::with_events([echo_call()]));
    }

    let orchestrator = OrchestratorBuilder::with_backend(backend)
        .with_tool(EchoTool::plain())
        .with_max_tool_depth(2)
        .build();
    orchestrator.submit("Loop forever").await;

    assert!(orchestrator.last_error().is_some());
    assert!(!orchestrator.is_sending());
}

#[tokio::test]
async fn test_image_attachment_switches_to_vision_model() {
    let backend = TestBackend::default();
    backend.push_response(PresetResponse::with_events([echo_call()]));
    backend.push_response(PresetResponse::with_events([
        PresetEvent::ContentDelta("I see a desktop.".to_owned()),
    ]));

    let orchestrator = OrchestratorBuilder::with_backend(backend.clone())
        .with_model("text-model")
        .with_vision_model("vision-model")
        .with_tool(EchoTool {
            attachment_images: vec![ImageRef("base64".to_owned())],
            ..EchoTool::plain()
        })
        .build();
    orchestrator.submit("What's on my screen?").await;

    assert_eq!(orchestrator.last_error(), None);
    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].model, "text-model");
    assert_eq!(requests[1].model, "vision-model");

    // The synthetic attachment message rode along with the follow-up
    // request only.
    let follow_up = requests[1].messages.last().unwrap();
    assert_eq!(follow_up.role, Role::User);
    assert_eq!(follow_up.content, "Here is the captured image.");
    assert_eq!(follow_up.images.len(), 1);
    assert!(
        orchestrator
            .history()
            .iter()
            .all(|m| m.content != "Here is the captured image.")
    );
}

#[tokio::test]
async fn test_system_prompt_is_request_only() {
    let backend = TestBackend::default();
    backend.push_response(PresetResponse::with_events([
        PresetEvent::ContentDelta("Aye.".to_owned()),
    ]));

    let orchestrator = OrchestratorBuilder::with_backend(backend.clone())
        .with_system_prompt("You are terse.")
        .build();
    orchestrator.submit("Hello").await;

    let requests = backend.requests();
    assert_eq!(requests[0].messages[0].role, Role::System);
    assert_eq!(requests[0].messages[0].content, "You are terse.");
    assert!(
        orchestrator
            .history()
            .iter()
            .all(|m| m.role != Role::System)
    );
}

#[tokio::test]
async fn test_backend_error_chunk_fails_the_turn() {
    let backend = TestBackend::default();
    backend.push_response(PresetResponse::with_events([
        PresetEvent::ContentDelta("partial".to_owned()),
        PresetEvent::Error("model exploded".to_owned()),
    ]));

    let orchestrator =
        OrchestratorBuilder::with_backend(backend).build();
    orchestrator.submit("Hello").await;

    let error = orchestrator.last_error().unwrap();
    assert!(error.contains("model exploded"));
    assert_eq!(orchestrator.history().len(), 1);
    assert!(
        orchestrator
            .display_messages()
            .iter()
            .all(|m| m.stream_token.is_none())
    );
}

#[tokio::test]
async fn test_unreachable_backend_fails_the_turn() {
    let backend = TestBackend::default();
    let orchestrator =
        OrchestratorBuilder::with_backend(backend).build();
    orchestrator.submit("Hello").await;

    assert!(orchestrator.last_error().is_some());
    assert_eq!(orchestrator.history().len(), 1);
}

#[tokio::test]
async fn test_new_submission_clears_previous_error() {
    let backend = TestBackend::default();
    // First request is unscripted and fails; then script the retry.
    let orchestrator = OrchestratorBuilder::with_backend(backend.clone())
        .build();
    orchestrator.submit("first").await;
    assert!(orchestrator.last_error().is_some());

    backend.push_response(PresetResponse::with_events([
        PresetEvent::ContentDelta("Recovered.".to_owned()),
    ]));
    orchestrator.submit("second").await;
    assert_eq!(orchestrator.last_error(), None);
}

#[tokio::test]
async fn test_clear_empties_everything() {
    let backend = TestBackend::default();
    backend.push_response(PresetResponse::with_events([
        PresetEvent::ContentDelta("Hi.".to_owned()),
    ]));

    let orchestrator =
        OrchestratorBuilder::with_backend(backend).build();
    orchestrator.submit("Hello").await;
    orchestrator.clear();

    assert!(orchestrator.history().is_empty());
    assert!(orchestrator.display_messages().is_empty());
    assert!(!orchestrator.can_regenerate());
}

#[tokio::test]
async fn test_submission_while_sending_is_ignored() {
    let backend = TestBackend::default();
    backend.set_delay(Duration::from_millis(50));
    backend.push_response(PresetResponse::with_events([
        PresetEvent::ContentDelta("Slow answer.".to_owned()),
    ]));

    let orchestrator =
        OrchestratorBuilder::with_backend(backend).build();
    let turn = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.submit("first").await })
    };
    sleep(Duration::from_millis(10)).await;
    orchestrator.submit("second").await;
    turn.await.unwrap();

    let history = orchestrator.history();
    let user_turns: Vec<_> = history
        .iter()
        .filter(|m| m.role == Role::User)
        .collect();
    assert_eq!(user_turns.len(), 1);
    assert_eq!(user_turns[0].content, "first");
}
