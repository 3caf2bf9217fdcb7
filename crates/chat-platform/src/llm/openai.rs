//! OpenAI-compatible streaming completion adapter.
//!
//! Works with any provider speaking the chat completions API format.
//! One prompt in, one SSE stream of text deltas out.

use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use chat_core::ports::{CompletionEvent, CompletionPort, CompletionStream};
use chat_types::config::DEFAULT_MODEL;

use super::sse::SseParser;

pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    /// Set the model to use
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set custom base URL (for API-compatible services)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[derive(Deserialize)]
struct StreamResponse {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// Extract the text deltas out of one SSE payload. `None` marks `[DONE]`.
fn deltas_from_payload(data: &str) -> Option<Vec<String>> {
    if data.trim() == "[DONE]" {
        return None;
    }
    let parsed: StreamResponse = match serde_json::from_str(data) {
        Ok(p) => p,
        // Tolerate frames we don't understand, as upstreams add fields.
        Err(_) => return Some(Vec::new()),
    };
    Some(
        parsed
            .choices
            .into_iter()
            .filter_map(|c| c.delta.content)
            .filter(|c| !c.is_empty())
            .collect(),
    )
}

impl CompletionPort for OpenAiClient {
    fn stream_completion(&self, prompt: &str) -> CompletionStream {
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let base_url = self.base_url.clone();
        let model = self.model.clone();
        let prompt = prompt.to_string();

        Box::pin(async_stream::stream! {
            let body = json!({
                "model": model,
                "messages": [{ "role": "user", "content": prompt }],
                "stream": true,
            });

            let response = match client
                .post(format!("{}/chat/completions", base_url))
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    yield CompletionEvent::Error(format!("Request failed: {}", e));
                    return;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                yield CompletionEvent::Error(format!("HTTP {}: {}", status, text));
                return;
            }

            let mut byte_stream = response.bytes_stream();
            let mut parser = SseParser::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        yield CompletionEvent::Error(format!("Stream error: {}", e));
                        return;
                    }
                };

                for payload in parser.push(&String::from_utf8_lossy(&chunk)) {
                    match deltas_from_payload(&payload) {
                        None => {
                            yield CompletionEvent::Done;
                            return;
                        }
                        Some(deltas) => {
                            for delta in deltas {
                                yield CompletionEvent::Delta(delta);
                            }
                        }
                    }
                }
            }

            // The upstream closed without [DONE]; flush what remains.
            for payload in parser.finish() {
                if let Some(deltas) = deltas_from_payload(&payload) {
                    for delta in deltas {
                        yield CompletionEvent::Delta(delta);
                    }
                }
            }
            yield CompletionEvent::Done;
        })
    }
}
