// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
/// YAML-configured mock client for offline CLI runs and demos.
///
/// Replies listed under `sequence` are served in order first.  After that,
/// each call is answered by the first rule whose pattern matches the last
/// non-system message.
///
/// # YAML format
///
/// ```yaml
/// sequence:
///   - |
///     <tool_call>{"tool": "planner_setup_page", "input": {"url": "https://example.com"}}</tool_call>
/// responses:
///   - match_type: contains        # contains | equals | starts_with | regex | default
///     pattern: "browser_snapshot"
///     reply: "<final_answer>done</final_answer>"
///   - match_type: default
///     reply: "<tool_call>{\"tool\": \"browser_snapshot\", \"input\": {}}</tool_call>"
/// ```
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::{Message, ModelClient, ModelError, Role};

#[derive(Debug, Deserialize)]
pub struct MockConfig {
    #[serde(default)]
    pub sequence: Vec<String>,
    #[serde(default)]
    pub responses: Vec<ResponseRule>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseRule {
    pub match_type: MatchType,
    /// Ignored for the `default` match type.
    #[serde(default)]
    pub pattern: String,
    pub reply: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Contains,
    Equals,
    StartsWith,
    Regex,
    Default,
}

impl ResponseRule {
    fn matches(&self, text: &str) -> bool {
        match self.match_type {
            MatchType::Contains => text.contains(&self.pattern),
            MatchType::Equals => text.trim() == self.pattern.trim(),
            MatchType::StartsWith => text.starts_with(&self.pattern),
            MatchType::Regex => regex::Regex::new(&self.pattern)
                .map(|re| re.is_match(text))
                .unwrap_or(false),
            MatchType::Default => true,
        }
    }
}

pub struct YamlMockClient {
    sequence: Mutex<VecDeque<String>>,
    rules: Vec<ResponseRule>,
}

impl YamlMockClient {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading mock responses {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing mock responses {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        let cfg: MockConfig = serde_yaml::from_str(text)?;
        Ok(Self {
            sequence: Mutex::new(cfg.sequence.into_iter().collect()),
            rules: cfg.responses,
        })
    }
}

#[async_trait]
impl ModelClient for YamlMockClient {
    fn name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "yaml-mock"
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, ModelError> {
        if let Some(next) = self.sequence.lock().ok().and_then(|mut s| s.pop_front()) {
            return Ok(next);
        }

        let last = messages
            .iter()
            .rev()
            .find(|m| m.role != Role::System)
            .map(|m| m.content.as_str())
            .unwrap_or("");

        match self.rules.iter().find(|r| r.matches(last)) {
            Some(rule) => {
                debug!(match_type = ?rule.match_type, pattern = %rule.pattern, "mock rule matched");
                Ok(rule.reply.clone())
            }
            None => Err(ModelError::Endpoint {
                status: 404,
                body: "no mock rule matched the last message".into(),
            }),
        }
    }
}
