//! Chat completion client.
//!
//! The [`CompletionClient`] trait is the loop's only view of the model: the
//! full transcript in, the assistant's raw text out. [`OpenAiClient`] talks to
//! an OpenAI-compatible `/chat/completions` endpoint and forces a JSON object
//! response.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::core::types::Message;
use crate::io::config::RuntimeOptions;

/// Sends a transcript to a language model and returns the reply text.
pub trait CompletionClient {
    fn complete(&self, messages: &[Message]) -> Result<String>;
}

/// Blocking client for OpenAI-compatible chat completions.
pub struct OpenAiClient {
    http: Client,
    endpoint: String,
    model: String,
    token: String,
}

impl OpenAiClient {
    pub fn new(options: &RuntimeOptions) -> Result<Self> {
        // Completions can take minutes; the loop waits as long as the server does.
        let http = Client::builder()
            .timeout(None::<Duration>)
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", options.api_base.trim_end_matches('/')),
            model: options.model.clone(),
            token: options.api_token.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl CompletionClient for OpenAiClient {
    #[instrument(skip_all, fields(model = %self.model, messages = messages.len()))]
    fn complete(&self, messages: &[Message]) -> Result<String> {
        info!("requesting completion");
        let request = ChatRequest {
            model: &self.model,
            messages,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .with_context(|| format!("send request to {}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let reason = serde_json::from_str::<ApiError>(&body)
                .map(|err| err.error.message)
                .unwrap_or(body);
            warn!(status = %status, "completion request failed");
            return Err(anyhow!("completion request failed ({status}): {reason}"));
        }

        let parsed: ChatResponse = response.json().context("parse completion response")?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("completion response has no choices"))?
            .message
            .content
            .unwrap_or_default();

        debug!(bytes = content.len(), "received completion");
        Ok(content)
    }
}
