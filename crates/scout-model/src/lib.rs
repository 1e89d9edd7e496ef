// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod types;
mod client;
mod ollama;
mod openai_compat;
mod mock;
mod yaml_mock;

pub use types::*;
pub use client::{ModelClient, ModelError};
pub use ollama::OllamaClient;
pub use openai_compat::{AuthStyle, OpenAiCompatClient};
pub use mock::ScriptedMockClient;
pub use yaml_mock::YamlMockClient;

use std::sync::Arc;

use anyhow::bail;
use scout_config::ModelConfig;

/// Build a model client from config.
pub fn from_config(cfg: &ModelConfig) -> anyhow::Result<Arc<dyn ModelClient>> {
    match cfg.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaClient::new(
            cfg.name.clone(),
            cfg.base_url.clone(),
            cfg.temperature,
            cfg.max_tokens,
        )?)),
        "openai" => {
            let key = resolve_api_key(cfg);
            let auth = if key.is_some() { AuthStyle::Bearer } else { AuthStyle::None };
            Ok(Arc::new(OpenAiCompatClient::new(
                cfg.name.clone(),
                cfg.base_url.clone(),
                key,
                auth,
                cfg.temperature,
                cfg.max_tokens,
            )?))
        }
        "mock" => {
            // Prefer env var, then config field
            let responses_path = std::env::var("SCOUT_MOCK_RESPONSES")
                .ok()
                .or_else(|| cfg.mock_responses_file.clone());
            match responses_path {
                Some(path) => Ok(Arc::new(YamlMockClient::from_file(&path)?)),
                None => bail!("provider \"mock\" needs model.mock_responses_file or SCOUT_MOCK_RESPONSES"),
            }
        }
        other => bail!("unknown model provider: {other}"),
    }
}

fn resolve_api_key(cfg: &ModelConfig) -> Option<String> {
    if let Some(k) = &cfg.api_key {
        return Some(k.clone());
    }
    if let Some(env) = &cfg.api_key_env {
        return std::env::var(env).ok();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_is_rejected() {
        let cfg = ModelConfig { provider: "carrier-pigeon".into(), ..ModelConfig::default() };
        let err = from_config(&cfg).err().unwrap();
        assert!(err.to_string().contains("carrier-pigeon"));
    }

    #[test]
    fn default_config_builds_ollama_client() {
        let client = from_config(&ModelConfig::default()).unwrap();
        assert_eq!(client.name(), "ollama");
        assert_eq!(client.model_name(), "llama3.1:8b-instruct-q5_K_M");
    }

    #[test]
    fn explicit_api_key_wins_over_env() {
        let cfg = ModelConfig {
            api_key: Some("k-1".into()),
            api_key_env: Some("SCOUT_TEST_UNSET_KEY_VAR".into()),
            ..ModelConfig::default()
        };
        assert_eq!(resolve_api_key(&cfg).as_deref(), Some("k-1"));
    }
}
