//! Wire types for the Ollama `/api/chat` endpoint.

use glimpse_backend::{
    AssistantDelta, ChatMessage, ChatRequest, ImageRef, Role, ToolCall,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub(crate) struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireToolDefinition<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall<'a>>,
    #[serde(skip_serializing_if = "<[ImageRef]>::is_empty")]
    images: &'a [ImageRef],
}

/// Ollama wraps tool calls in a `function` object.
#[derive(Debug, Serialize)]
struct WireToolCall<'a> {
    function: WireFunctionCall<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunctionCall<'a> {
    name: &'a str,
    arguments: &'a Value,
}

#[derive(Debug, Serialize)]
struct WireToolDefinition<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

pub(crate) fn create_request(
    req: &ChatRequest,
    stream: bool,
) -> WireRequest<'_> {
    WireRequest {
        model: &req.model,
        messages: req.messages.iter().map(to_wire_message).collect(),
        tools: req
            .tools
            .iter()
            .map(|tool| WireToolDefinition {
                kind: "function",
                function: WireFunction {
                    name: &tool.name,
                    description: &tool.description,
                    parameters: &tool.parameters,
                },
            })
            .collect(),
        stream,
    }
}

fn to_wire_message(message: &ChatMessage) -> WireMessage<'_> {
    WireMessage {
        role: message.role,
        content: &message.content,
        tool_name: message.tool_name.as_deref(),
        tool_calls: message
            .tool_calls
            .iter()
            .map(|call| WireToolCall {
                function: WireFunctionCall {
                    name: &call.name,
                    arguments: &call.arguments,
                },
            })
            .collect(),
        images: &message.images,
    }
}

/// One NDJSON line of a streaming response.
#[derive(Debug, Deserialize)]
pub(crate) struct WireChunk {
    #[serde(default)]
    pub message: Option<WireDelta>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    thoughts: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<WireToolCallOwned>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireToolCallOwned {
    function: WireFunctionCallOwned,
}

#[derive(Debug, Deserialize)]
struct WireFunctionCallOwned {
    name: String,
    #[serde(default)]
    arguments: Value,
}

pub(crate) fn delta_from_wire(wire: WireDelta) -> AssistantDelta {
    let mut delta = AssistantDelta::default();
    delta.content = wire.content;
    delta.tool_calls = wire
        .tool_calls
        .into_iter()
        .map(|call| ToolCall {
            name: call.function.name,
            arguments: call.function.arguments,
        })
        .collect();
    let reasoning = [wire.reasoning, wire.thinking, wire.thoughts]
        .into_iter()
        .flatten()
        .next();
    if let Some(reasoning) = reasoning {
        delta = delta.with_reasoning(reasoning);
    }
    delta
}

#[cfg(test)]
mod tests {
    use glimpse_backend::ToolDefinition;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let req = ChatRequest {
            model: "gpt-oss:20b-cloud".to_owned(),
            messages: vec![
                ChatMessage::user("hi"),
                ChatMessage::assistant_tool_calls(vec![ToolCall {
                    name: "read_file".to_owned(),
                    arguments: json!({ "path": "a.txt" }),
                }]),
                ChatMessage::tool("read_file", "{}"),
            ],
            tools: vec![ToolDefinition {
                name: "read_file".to_owned(),
                description: "Reads a file.".to_owned(),
                parameters: json!({ "type": "object" }),
            }],
        };

        let wire = serde_json::to_value(create_request(&req, true)).unwrap();
        assert_eq!(wire["stream"], json!(true));
        assert_eq!(wire["messages"][0]["role"], json!("user"));
        assert!(wire["messages"][0].get("tool_calls").is_none());
        assert_eq!(
            wire["messages"][1]["tool_calls"][0]["function"]["name"],
            json!("read_file")
        );
        assert_eq!(wire["messages"][2]["tool_name"], json!("read_file"));
        assert_eq!(wire["tools"][0]["type"], json!("function"));
        assert_eq!(
            wire["tools"][0]["function"]["parameters"],
            json!({ "type": "object" })
        );
    }

    #[test]
    fn test_chunk_with_thinking() {
        let chunk: WireChunk = serde_json::from_str(
            r#"{ "message": { "content": "a", "thinking": "hmm" } }"#,
        )
        .unwrap();
        let delta = delta_from_wire(chunk.message.unwrap());
        assert_eq!(delta.content.as_deref(), Some("a"));
        assert_eq!(delta.reasoning_fragment(), Some("hmm"));
        assert!(!chunk.done);
    }

    #[test]
    fn test_chunk_with_wrapped_tool_call() {
        let chunk: WireChunk = serde_json::from_str(
            r#"{
                "message": {
                    "tool_calls": [
                        { "function": { "name": "read_file",
                                        "arguments": { "path": "x" } } }
                    ]
                },
                "done": false
            }"#,
        )
        .unwrap();
        let delta = delta_from_wire(chunk.message.unwrap());
        assert_eq!(delta.tool_calls.len(), 1);
        assert_eq!(delta.tool_calls[0].name, "read_file");
        assert_eq!(delta.tool_calls[0].arguments, json!({ "path": "x" }));
    }

    #[test]
    fn test_done_line() {
        let chunk: WireChunk =
            serde_json::from_str(r#"{ "done": true }"#).unwrap();
        assert!(chunk.done);
        assert!(chunk.message.is_none());
    }
}
