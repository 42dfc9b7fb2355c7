//! A chat backend for a local Ollama server.

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use glimpse_backend::{
    ChatBackend, ChatBackendError, ChatMessage, ChatRequest,
    ChatResponse, ErrorKind, StreamChunk,
};
use mime::Mime;
use reqwest::{Client, Response, header};
use tokio::sync::broadcast;

pub use config::{OllamaConfig, OllamaConfigBuilder};
use io::{Chunks, Lines, LinesError};

const CHANNEL_CAPACITY: usize = 256;

/// Error type for [`OllamaBackend`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    fn from_reqwest(err: &reqwest::Error) -> Self {
        Self::new(describe_reqwest_error(err), ErrorKind::Unreachable)
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
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

/// Normalizes common transport failures into readable messages.
fn describe_reqwest_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        return "timeout while connecting to Ollama".to_string();
    }
    if err.is_connect() {
        return "connection refused by Ollama".to_string();
    }
    format!("request error: {err}")
}

/// A chat backend talking to a local Ollama server.
#[derive(Clone, Debug)]
pub struct OllamaBackend {
    client: Client,
    config: Arc<OllamaConfig>,
    tx: broadcast::Sender<StreamChunk>,
}

impl OllamaBackend {
    /// Creates a new `OllamaBackend` with the given configuration.
    pub fn new(config: OllamaConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|err| {
                Error::new(
                    format!("HTTP client error: {err}"),
                    ErrorKind::Other,
                )
            })?;
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Ok(Self {
            client,
            config: Arc::new(config),
            tx,
        })
    }

    /// Checks whether the server is reachable and responding.
    pub async fn health_check(&self) -> Result<(), Error> {
        let url = format!("{}/api/tags", self.config.base_url);
        let resp = self
            .client
            .get(url)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|err| Error::from_reqwest(&err))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::new(
                format!("non-200 from Ollama: {status} {body}"),
                ErrorKind::Protocol,
            ));
        }
        Ok(())
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.base_url)
    }
}

impl ChatBackend for OllamaBackend {
    type Error = Error;

    fn subscribe(&self) -> broadcast::Receiver<StreamChunk> {
        self.tx.subscribe()
    }

    fn stream_chat(
        &self,
        req: &ChatRequest,
        correlation_id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static
    {
        let wire_req = proto::create_request(req, true);
        let resp_fut = self
            .client
            .post(self.chat_url())
            .header(header::CONTENT_TYPE, "application/json")
            .json(&wire_req)
            .send();
        let tx = self.tx.clone();
        let correlation_id = correlation_id.to_owned();

        async move {
            let resp = match resp_fut.await {
                Ok(resp) => resp,
                Err(err) => return Err(Error::from_reqwest(&err)),
            };
            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(Error::new(
                    format!("non-200 from Ollama: {status} {body}"),
                    ErrorKind::Protocol,
                ));
            }

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_ndjson = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| m.subtype().as_str() == "x-ndjson")
                .unwrap_or(false);
            if !is_ndjson {
                warn!("unexpected content type: {content_type:?}");
            }

            // The request is accepted; the chunks arrive on the
            // shared channel from here on.
            tokio::spawn(read_stream(resp, tx, correlation_id));
            Ok(())
        }
    }

    fn chat(
        &self,
        req: &ChatRequest,
    ) -> impl Future<Output = Result<ChatResponse, Self::Error>>
    + Send
    + 'static {
        let wire_req = proto::create_request(req, false);
        let resp_fut = self
            .client
            .post(self.chat_url())
            .header(header::CONTENT_TYPE, "application/json")
            .timeout(self.config.timeout)
            .json(&wire_req)
            .send();

        async move {
            let resp = match resp_fut.await {
                Ok(resp) => resp,
                Err(err) => return Err(Error::from_reqwest(&err)),
            };
            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(Error::new(
                    format!("non-200 from Ollama: {status} {body}"),
                    ErrorKind::Protocol,
                ));
            }
            let wire: proto::WireChunk =
                resp.json().await.map_err(|err| {
                    Error::new(
                        format!("invalid Ollama response: {err}"),
                        ErrorKind::Protocol,
                    )
                })?;
            Ok(ChatResponse {
                message: wire.message.map(complete_message),
            })
        }
    }
}

fn complete_message(wire: proto::WireDelta) -> ChatMessage {
    let delta = proto::delta_from_wire(wire);
    let content = delta.content.unwrap_or_default();
    if delta.tool_calls.is_empty() {
        ChatMessage::assistant(content)
    } else {
        ChatMessage::assistant_tool_calls(delta.tool_calls)
    }
}

/// Forwards one streaming response body onto the chunk channel.
async fn read_stream(
    resp: Response,
    tx: broadcast::Sender<StreamChunk>,
    correlation_id: String,
) {
    let mut lines = Lines::new(Chunks::from_response(resp));
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                // The body ended without a `done` marker.
                tx.send(StreamChunk::error(
                    &correlation_id,
                    "stream ended unexpectedly",
                ))
                .ok();
                return;
            }
            Err(LinesError::ChunksError(_)) => {
                tx.send(StreamChunk::error(
                    &correlation_id,
                    "connection to Ollama was lost",
                ))
                .ok();
                return;
            }
            Err(LinesError::InvalidPayload) => {
                tx.send(StreamChunk::error(
                    &correlation_id,
                    "invalid stream payload",
                ))
                .ok();
                return;
            }
        };

        let wire: proto::WireChunk = match serde_json::from_str(&line) {
            Ok(wire) => wire,
            Err(err) => {
                warn!("skipping malformed stream line: {err}");
                continue;
            }
        };
        if let Some(error) = wire.error {
            tx.send(StreamChunk::error(&correlation_id, error)).ok();
            return;
        }

        let mut chunk = match wire.message {
            Some(message) => StreamChunk::delta(
                &correlation_id,
                proto::delta_from_wire(message),
            ),
            None => StreamChunk::done(&correlation_id),
        };
        chunk.done = wire.done;
        if tx.send(chunk).is_err() {
            // Nobody is listening anymore.
            return;
        }
        if wire.done {
            return;
        }
    }
}
