// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::{Message, ModelClient, ModelError};

/// A pre-scripted mock client.  Each call to `complete` pops the next
/// scripted result from the front of the queue, so tests can specify the
/// exact sequence of completions (and failures) without network access.
///
/// Once the script runs dry the client keeps answering with the repeat
/// text if one was set, otherwise with `"[no more scripts]"`.
#[derive(Clone)]
pub struct ScriptedMockClient {
    scripts: Arc<Mutex<VecDeque<Result<String, ModelError>>>>,
    repeat: Option<String>,
    delay: Option<Duration>,
    /// Every conversation seen by this client, in call order.
    pub requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl ScriptedMockClient {
    pub fn new<S: Into<String>>(replies: impl IntoIterator<Item = S>) -> Self {
        Self::with_results(replies.into_iter().map(|r| Ok(r.into())))
    }

    /// Script that can interleave failures with replies.
    pub fn with_results(results: impl IntoIterator<Item = Result<String, ModelError>>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(results.into_iter().collect())),
            repeat: None,
            delay: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer every call with the same text.
    pub fn repeating(text: impl Into<String>) -> Self {
        let mut m = Self::with_results(Vec::new());
        m.repeat = Some(text.into());
        m
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `complete` calls made so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// The conversation sent on the most recent call.
    pub fn last_request(&self) -> Option<Vec<Message>> {
        self.requests.lock().ok().and_then(|r| r.last().cloned())
    }
}

#[async_trait]
impl ModelClient for ScriptedMockClient {
    fn name(&self) -> &str {
        "scripted-mock"
    }

    fn model_name(&self) -> &str {
        "scripted-mock-model"
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, ModelError> {
        if let Ok(mut reqs) = self.requests.lock() {
            reqs.push(messages.to_vec());
        }
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        let next = self.scripts.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(result) => result,
            None => Ok(self.repeat.clone().unwrap_or_else(|| "[no more scripts]".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replies_come_back_in_order_then_fallback() {
        let m = ScriptedMockClient::new(["one", "two"]);
        assert_eq!(m.complete(&[]).await.unwrap(), "one");
        assert_eq!(m.complete(&[]).await.unwrap(), "two");
        assert_eq!(m.complete(&[]).await.unwrap(), "[no more scripts]");
        assert_eq!(m.calls(), 3);
    }

    #[tokio::test]
    async fn scripted_failures_surface_as_errors() {
        let m = ScriptedMockClient::with_results([
            Err(ModelError::Transport("connection refused".into())),
            Ok("fine".to_string()),
        ]);
        assert!(matches!(m.complete(&[]).await, Err(ModelError::Transport(_))));
        assert_eq!(m.complete(&[]).await.unwrap(), "fine");
    }

    #[tokio::test]
    async fn records_each_conversation() {
        let m = ScriptedMockClient::repeating("again");
        m.complete(&[Message::user("a")]).await.unwrap();
        m.complete(&[Message::user("a"), Message::assistant("again")]).await.unwrap();
        assert_eq!(m.last_request().unwrap().len(), 2);
    }
}
