// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Native Ollama driver (`POST /api/chat`, non-streaming).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::{types::wire_messages, Message, ModelClient, ModelError};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

pub struct OllamaClient {
    model: String,
    chat_url: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(
        model: String,
        base_url: Option<String>,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> anyhow::Result<Self> {
        let base = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into());
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            model,
            chat_url: format!("{}/api/chat", base.trim_end_matches('/')),
            temperature,
            max_tokens,
            client,
        })
    }

    fn request_body(&self, messages: &[Message]) -> Value {
        let mut options = serde_json::Map::new();
        if let Some(t) = self.temperature {
            options.insert("temperature".into(), json!(t));
        }
        if let Some(n) = self.max_tokens {
            options.insert("num_predict".into(), json!(n));
        }
        json!({
            "model": self.model,
            "messages": wire_messages(messages),
            "stream": false,
            "options": options,
        })
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, ModelError> {
        debug!(driver = "ollama", model = %self.model, turns = messages.len(), "sending completion request");

        let resp = self.client.post(&self.chat_url).json(&self.request_body(messages)).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::Endpoint { status: status.as_u16(), body });
        }

        let body: Value = resp.json().await?;
        extract_content(&body)
    }
}

fn extract_content(body: &Value) -> Result<String, ModelError> {
    if let Some(err) = body.get("error").and_then(|e| e.as_str()) {
        return Err(ModelError::Endpoint { status: 200, body: err.to_string() });
    }
    body.pointer("/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| ModelError::Decode("response has no message.content".into()))
}
