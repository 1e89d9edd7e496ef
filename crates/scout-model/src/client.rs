// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;

use crate::Message;

/// Failure of a single inference call.  Every variant is a transport-level
/// problem from the agent's point of view and may be retried.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("model call timed out after {0}s")]
    Timeout(u64),
    #[error("endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },
    #[error("could not decode completion: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ModelError::Decode(e.to_string())
        } else {
            ModelError::Transport(e.to_string())
        }
    }
}

/// A text-completion endpoint.  Receives the whole conversation so far and
/// returns one raw completion.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Driver identifier, e.g. "ollama".
    fn name(&self) -> &str;
    fn model_name(&self) -> &str;

    async fn complete(&self, messages: &[Message]) -> Result<String, ModelError>;

    /// One-line probe confirming the endpoint answers at all.
    async fn health_check(&self) -> Result<(), ModelError> {
        let probe = [Message::user("Reply with the single word: ready")];
        self.complete(&probe).await.map(|_| ())
    }
}
