use std::fs;
use std::path::Path;

use glimpse_core::tool::{
    Error as ToolError, Tool, ToolOutput, ToolResult,
};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::spawn_blocking;

const MAX_FILE_BYTES: u64 = 1_000_000;

#[derive(Deserialize, JsonSchema)]
pub struct ReadFileParameters {
    #[schemars(description = "Absolute path to a local text file.")]
    path: String,
}

/// A tool for reading small local text files.
pub struct ReadFileTool {
    parameter_schema: Value,
}

impl ReadFileTool {
    /// Creates a new read file tool.
    #[inline]
    pub fn new() -> Self {
        ReadFileTool {
            parameter_schema: schema_for!(ReadFileParameters).to_value(),
        }
    }
}

impl Default for ReadFileTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for ReadFileTool {
    type Input = ReadFileParameters;

    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a local text file from disk. Use when the user asks to \
         inspect a file."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: ReadFileParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move {
            if !Path::new(&input.path).is_absolute() {
                return Err(ToolError::execution_error()
                    .with_reason("`path` must be absolute"));
            }
            let payload =
                spawn_blocking(move || read_bounded(&input.path))
                    .await
                    .map_err(|_| {
                        ToolError::execution_error()
                            .with_reason("Failed to read file")
                    })??;
            Ok(ToolOutput::content(payload))
        }
    }
}

/// Reads a file into a `{path, bytes, content}` payload. Reads stay
/// bounded; this tool is meant for small text files.
fn read_bounded(path: &str) -> Result<Value, ToolError> {
    let metadata = fs::metadata(path).map_err(|err| {
        ToolError::execution_error()
            .with_reason(format!("Unable to read file metadata: {err}"))
    })?;
    if !metadata.is_file() {
        return Err(ToolError::execution_error()
            .with_reason("Path is not a file."));
    }
    if metadata.len() > MAX_FILE_BYTES {
        return Err(ToolError::execution_error().with_reason(format!(
            "File too large ({bytes} bytes). Limit is {limit} bytes.",
            bytes = metadata.len(),
            limit = MAX_FILE_BYTES
        )));
    }

    let bytes = fs::read(path).map_err(|err| {
        ToolError::execution_error()
            .with_reason(format!("Unable to read file: {err}"))
    })?;
    build_payload(path, bytes)
}

fn build_payload(path: &str, bytes: Vec<u8>) -> Result<Value, ToolError> {
    let len = bytes.len();
    let content = String::from_utf8(bytes).map_err(|_| {
        ToolError::execution_error()
            .with_reason("File is not valid UTF-8 text.")
    })?;
    Ok(json!({
        "path": path,
        "bytes": len,
        "content": content,
    }))
}
