// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Driver for servers speaking the OpenAI `/chat/completions` wire format
//! (vLLM, LM Studio, llama.cpp server, Ollama's `/v1` shim).
//!
//! # Auth styles
//! - `Bearer`: `Authorization: Bearer <key>`
//! - `None`: no authentication header (local servers)

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::{types::wire_messages, Message, ModelClient, ModelError};

const DEFAULT_BASE_URL: &str = "http://localhost:8000/v1";

/// How to send the API key in HTTP requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStyle {
    Bearer,
    None,
}

pub struct OpenAiCompatClient {
    model: String,
    chat_url: String,
    api_key: Option<String>,
    auth: AuthStyle,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(
        model: String,
        base_url: Option<String>,
        api_key: Option<String>,
        auth: AuthStyle,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> anyhow::Result<Self> {
        let base = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into());
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            model,
            chat_url: format!("{}/chat/completions", base.trim_end_matches('/')),
            api_key,
            auth,
            temperature,
            max_tokens,
            client,
        })
    }

    fn request_body(&self, messages: &[Message]) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": wire_messages(messages),
            "stream": false,
        });
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(n) = self.max_tokens {
            body["max_tokens"] = json!(n);
        }
        body
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, ModelError> {
        debug!(driver = "openai", model = %self.model, turns = messages.len(), "sending completion request");

        let mut req = self.client.post(&self.chat_url).json(&self.request_body(messages));
        if let (AuthStyle::Bearer, Some(key)) = (&self.auth, &self.api_key) {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::Endpoint { status: status.as_u16(), body });
        }

        let body: Value = resp.json().await?;
        body.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| ModelError::Decode("response has no choices[0].message.content".into()))
    }
}
