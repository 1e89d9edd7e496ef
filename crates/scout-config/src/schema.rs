// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub page: PageConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Provider identifier: "ollama" | "openai" | "mock"
    pub provider: String,
    /// Model name forwarded to the inference endpoint
    pub name: String,
    /// Base URL override.  Defaults to `http://localhost:11434` for Ollama
    /// and `http://localhost:8000/v1` for OpenAI-compatible servers.
    pub base_url: Option<String>,
    /// Environment variable that holds the API key (read at runtime)
    pub api_key_env: Option<String>,
    /// Explicit API key; prefer api_key_env in config files
    pub api_key: Option<String>,
    /// Sampling temperature (0.0–2.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to request in a single completion
    pub max_tokens: Option<u32>,
    /// Path to YAML mock-responses file (used when provider = "mock").
    /// Can also be set via the SCOUT_MOCK_RESPONSES environment variable.
    pub mock_responses_file: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".into(),
            name: "llama3.1:8b-instruct-q5_K_M".into(),
            base_url: None,
            api_key_env: None,
            api_key: None,
            temperature: Some(0.2),
            max_tokens: Some(4096),
            mock_responses_file: None,
        }
    }
}

/// Limits that bound a single agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Iteration ceiling; a run that has not produced a valid final answer
    /// after this many model calls fails with a budget error.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Extra attempts allowed for a failed or timed-out model call.
    #[serde(default = "default_retry_budget")]
    pub model_retry_budget: u32,
    /// Consecutive tool timeouts tolerated before the run fails.
    #[serde(default = "default_retry_budget")]
    pub tool_retry_budget: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// Observations longer than this are cut down to head + tail.
    #[serde(default = "default_observation_char_cap")]
    pub observation_char_cap: usize,
}

fn default_max_iterations() -> u32 { 25 }
fn default_retry_budget() -> u32 { 2 }
fn default_retry_backoff_ms() -> u64 { 500 }
fn default_model_timeout_secs() -> u64 { 120 }
fn default_tool_timeout_secs() -> u64 { 30 }
fn default_observation_char_cap() -> usize { 12_000 }

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            model_retry_budget: default_retry_budget(),
            tool_retry_budget: default_retry_budget(),
            retry_backoff_ms: default_retry_backoff_ms(),
            model_timeout_secs: default_model_timeout_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
            observation_char_cap: default_observation_char_cap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Characters of visible page text included in a snapshot.
    #[serde(default = "default_snapshot_text_chars")]
    pub snapshot_text_chars: usize,
    /// Interactive elements listed per snapshot.
    #[serde(default = "default_max_elements")]
    pub max_elements: usize,
}

fn default_user_agent() -> String { concat!("scout/", env!("CARGO_PKG_VERSION")).into() }
fn default_fetch_timeout_secs() -> u64 { 15 }
fn default_snapshot_text_chars() -> usize { 3000 }
fn default_max_elements() -> usize { 200 }

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            snapshot_text_chars: default_snapshot_text_chars(),
            max_elements: default_max_elements(),
        }
    }
}

/// Where validated artifacts are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_plans_dir")]
    pub plans_dir: String,
    #[serde(default = "default_tests_dir")]
    pub tests_dir: String,
}

fn default_plans_dir() -> String { "specs".into() }
fn default_tests_dir() -> String { "tests".into() }

impl Default for OutputConfig {
    fn default() -> Self {
        Self { plans_dir: default_plans_dir(), tests_dir: default_tests_dir() }
    }
}

impl OutputConfig {
    /// Plans directory with `~` and `$VARS` expanded.
    pub fn plans_path(&self) -> PathBuf {
        expand_path(&self.plans_dir)
    }

    /// Tests directory with `~` and `$VARS` expanded.
    pub fn tests_path(&self) -> PathBuf {
        expand_path(&self.tests_dir)
    }
}

/// Expand `~` and environment variables; unknown variables leave the
/// input untouched.
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(raw),
    }
}
