//! A simple program demonstrates how to use `glimpse` as a library.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;

use glimpse::SessionBuilder;
use glimpse_backend::Role;
use glimpse_core::tool::{Consent, ConsentError, ConsentProvider};
use glimpse_ollama_backend::{OllamaBackend, OllamaConfigBuilder};
use tokio::io::{self, AsyncBufReadExt};

const DEFAULT_MODEL: &str = "gpt-oss:20b-cloud";

/// Grants every tool consent request, after telling the user.
///
/// A real host would surface a prompt instead.
struct PrintingConsent;

#[async_trait::async_trait]
impl ConsentProvider for PrintingConsent {
    async fn request_consent(&self) -> Result<Consent, ConsentError> {
        println!("(allowing the requested action)");
        Ok(Consent { approved: true })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let model =
        env::var("GLIMPSE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
    let mut config_builder = OllamaConfigBuilder::new();
    if let Ok(base_url) = env::var("OLLAMA_BASE_URL") {
        config_builder = config_builder.with_base_url(base_url);
    }

    let backend = match OllamaBackend::new(config_builder.build()) {
        Ok(backend) => backend,
        Err(err) => {
            eprintln!("failed to create the backend: {}", err.message());
            return;
        }
    };
    if let Err(err) = backend.health_check().await {
        warn!("Ollama is not reachable yet: {}", err.message());
    }

    let session = SessionBuilder::with_backend(backend)
        .with_model(model)
        .with_consent_provider(PrintingConsent)
        .build();

    loop {
        print!("> ");
        std::io::stdout().flush().unwrap();

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/clear" => {
                session.clear();
                continue;
            }
            "/regen" if session.can_regenerate() => {
                session.regenerate_last().await;
            }
            _ => {
                session.send_message(line).await;
            }
        }

        if let Some(error) = session.last_error() {
            eprintln!("error: {error}");
            continue;
        }
        print_last_reply(&session);
    }
}

fn print_last_reply(session: &glimpse::Session) {
    let messages = session.display_messages();
    let Some(reply) = messages
        .iter()
        .rev()
        .find(|item| item.message.role == Role::Assistant)
    else {
        return;
    };

    if let Some(thinking) = &reply.thinking {
        let duration = reply
            .thinking_duration
            .map(|duration| format!(" ({:.1}s)", duration.as_secs_f64()))
            .unwrap_or_default();
        println!("[thought{duration}] {thinking}");
    }
    if let Some(activity) = &reply.tool_activity {
        println!("[{activity}]");
    }
    println!("{}", reply.message.content);
}

async fn read_line() -> Option<String> {
    let mut line = String::new();
    let mut reader = io::BufReader::new(io::stdin());
    if reader.read_line(&mut line).await.ok()? == 0 {
        return None;
    }
    Some(line)
}
