// Gemini streaming client using reqwest-eventsource.
//
// Calls `models/{model}:streamGenerateContent?alt=sse`. Each SSE `data:`
// payload is a partial GenerateContentResponse; the server ends the reading
// by closing the stream, which reqwest-eventsource reports as
// `Error::StreamEnded`.

use futures_util::StreamExt;
use reqwest_eventsource::{Event, RequestBuilderExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::protocol::LlmEvent;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Generation method a model must support to be usable for readings.
pub const GENERATE_CONTENT: &str = "generateContent";

// ---------------------------------------------------------------------------
// GeminiClient
// ---------------------------------------------------------------------------

/// A model entry from the `models` listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    pub display_name: Option<String>,
}

/// Low-level Gemini API client.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, base_url: Option<String>) -> Self {
        let base_url = base_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one prompt and stream the response as `LlmEvent`s over `tx`.
    ///
    /// Every emitted event carries `generation` so the receiver can discard
    /// events from cancelled tasks. Returns when the stream is finished, an
    /// error was reported, or the receiver is dropped.
    pub async fn stream_message(
        &self,
        system: &str,
        user_content: &str,
        temperature: f32,
        max_tokens: u32,
        tx: mpsc::Sender<LlmEvent>,
        generation: u64,
    ) -> anyhow::Result<()> {
        if self.api_key.is_empty() {
            let _ = tx
                .send(LlmEvent::Error {
                    message: "API key not configured".to_string(),
                    generation,
                })
                .await;
            return Ok(());
        }

        // f32 -> f64 widening would otherwise send 0.4000000059604645.
        let temperature = (f64::from(temperature) * 100.0).round() / 100.0;
        let body = serde_json::json!({
            "systemInstruction": { "parts": [{ "text": system }] },
            "contents": [{ "role": "user", "parts": [{ "text": user_content }] }],
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": max_tokens
            }
        });

        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        );
        let request = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body);

        let mut es = match request.eventsource() {
            Ok(es) => es,
            Err(e) => {
                let _ = tx
                    .send(LlmEvent::Error {
                        message: format!("Failed to create event source: {e}"),
                        generation,
                    })
                    .await;
                return Ok(());
            }
        };

        let mut full_text = String::new();
        let mut input_tokens: u32 = 0;
        let mut output_tokens: u32 = 0;
        let mut stop_reason: Option<String> = None;

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => {
                    debug!("SSE connection opened");
                }
                Ok(Event::Message(msg)) => {
                    let data = &msg.data;
                    if let Some(message) = parse_api_error(data) {
                        let _ = tx.send(LlmEvent::Error { message, generation }).await;
                        es.close();
                        return Ok(());
                    }
                    if let Some((input, output)) = parse_usage(data) {
                        input_tokens = input;
                        output_tokens = output;
                    }
                    if let Some(reason) = parse_finish_reason(data) {
                        stop_reason = Some(reason);
                    }
                    match parse_chunk_text(data) {
                        Some(text) if !text.is_empty() => {
                            full_text.push_str(&text);
                            if tx.send(LlmEvent::Token { text, generation }).await.is_err() {
                                // Receiver dropped.
                                es.close();
                                return Ok(());
                            }
                        }
                        _ => debug!("SSE chunk without text"),
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => {
                    es.close();
                    break;
                }
                Err(err) => {
                    warn!(?err, "SSE stream error");
                    let _ = tx
                        .send(LlmEvent::Error {
                            message: extract_error_message(&err),
                            generation,
                        })
                        .await;
                    es.close();
                    return Ok(());
                }
            }
        }

        if full_text.is_empty() {
            let message = match stop_reason {
                Some(reason) => format!("Model returned no text (finish reason: {reason})"),
                None => "Stream ended without any content".to_string(),
            };
            let _ = tx.send(LlmEvent::Error { message, generation }).await;
        } else {
            debug!(input_tokens, output_tokens, "streaming complete");
            let _ = tx
                .send(LlmEvent::Complete {
                    full_text,
                    input_tokens,
                    output_tokens,
                    stop_reason,
                    generation,
                })
                .await;
        }

        Ok(())
    }

    /// List the models this key can use for content generation, following
    /// page tokens until the listing is exhausted.
    pub async fn list_models(&self) -> anyhow::Result<Vec<ModelInfo>> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(format!("{}/models", self.base_url))
                .header("x-goog-api-key", &self.api_key)
                .query(&[("pageSize", "1000")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                anyhow::bail!("model listing returned status {status}");
            }
            let body: Value = response.json().await?;
            models.extend(parse_model_list(&body));

            page_token = body
                .get("nextPageToken")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            if page_token.is_none() {
                break;
            }
        }

        info!("{} models support {}", models.len(), GENERATE_CONTENT);
        Ok(models)
    }
}

// ---------------------------------------------------------------------------
// LlmClient wrapper
// ---------------------------------------------------------------------------

/// Either a configured Gemini client or disabled (no API key).
pub enum LlmClient {
    Active(GeminiClient),
    Disabled,
}

impl LlmClient {
    /// `Active` when credentials carry a non-empty key, otherwise `Disabled`.
    pub fn from_config(config: &Config) -> Self {
        match &config.credentials.gemini_api_key {
            Some(key) if !key.is_empty() => LlmClient::Active(GeminiClient::new(
                key.clone(),
                config.llm.model.clone(),
                config.llm.base_url.clone(),
            )),
            _ => LlmClient::Disabled,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, LlmClient::Active(_))
    }

    pub async fn stream_message(
        &self,
        system: &str,
        user_content: &str,
        temperature: f32,
        max_tokens: u32,
        tx: mpsc::Sender<LlmEvent>,
        generation: u64,
    ) -> anyhow::Result<()> {
        match self {
            LlmClient::Active(client) => {
                client
                    .stream_message(system, user_content, temperature, max_tokens, tx, generation)
                    .await
            }
            LlmClient::Disabled => {
                let _ = tx
                    .send(LlmEvent::Error {
                        message: "LLM not configured".to_string(),
                        generation,
                    })
                    .await;
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// JSON parsing helpers
// ---------------------------------------------------------------------------

/// Concatenate the text parts of the first candidate.
///
/// Expected shape: `{ "candidates": [ { "content": { "parts": [ { "text": "..." } ] } } ] }`
pub(crate) fn parse_chunk_text(data: &str) -> Option<String> {
    let v: Value = serde_json::from_str(data).ok()?;
    let parts = v
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    Some(
        parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect(),
    )
}

/// `(promptTokenCount, candidatesTokenCount)` from `usageMetadata`.
pub(crate) fn parse_usage(data: &str) -> Option<(u32, u32)> {
    let v: Value = serde_json::from_str(data).ok()?;
    let usage = v.get("usageMetadata")?;
    let count = |key: &str| {
        usage
            .get(key)
            .and_then(Value::as_u64)
            .map(|n| n as u32)
            .unwrap_or(0)
    };
    Some((count("promptTokenCount"), count("candidatesTokenCount")))
}

pub(crate) fn parse_finish_reason(data: &str) -> Option<String> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("candidates")?
        .get(0)?
        .get("finishReason")?
        .as_str()
        .map(str::to_string)
}

/// In-stream error payload: `{ "error": { "code": N, "message": "..." } }`.
pub(crate) fn parse_api_error(data: &str) -> Option<String> {
    let v: Value = serde_json::from_str(data).ok()?;
    let err = v.get("error")?;
    let message = err.get("message").and_then(Value::as_str).unwrap_or("unknown error");
    Some(match err.get("code").and_then(Value::as_u64) {
        Some(code) => format!("API error {code}: {message}"),
        None => format!("API error: {message}"),
    })
}

/// Models supporting `generateContent` from one listing page.
pub(crate) fn parse_model_list(body: &Value) -> Vec<ModelInfo> {
    body.get("models")
        .and_then(Value::as_array)
        .map(|models| {
            models
                .iter()
                .filter(|m| {
                    m.get("supportedGenerationMethods")
                        .and_then(Value::as_array)
                        .is_some_and(|methods| {
                            methods.iter().any(|x| x.as_str() == Some(GENERATE_CONTENT))
                        })
                })
                .filter_map(|m| {
                    Some(ModelInfo {
                        name: m.get("name")?.as_str()?.to_string(),
                        display_name: m
                            .get("displayName")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn extract_error_message(err: &reqwest_eventsource::Error) -> String {
    match err {
        reqwest_eventsource::Error::InvalidStatusCode(status, _response) => {
            format!("API returned status {status}")
        }
        reqwest_eventsource::Error::Transport(e) => {
            format!("Network error: {e}")
        }
        other => format!("Stream error: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
