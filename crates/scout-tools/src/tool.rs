// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::policy::{Cardinality, ParamSpec};

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Run-local identifier, e.g. `"it3"`.
    pub id: String,
    pub name: String,
    /// Arguments already checked against the tool's parameter list.
    pub args: Map<String, Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self { id: id.into(), name: name.into(), args }
    }

    /// String argument lookup; `None` when absent or not a string.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(|v| v.as_str())
    }
}

/// The result of executing a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub call_id: String,
    pub content: String,
    /// The tool failed non-fatally; `content` holds the error message.
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { call_id: call_id.into(), content: content.into(), is_error: false }
    }

    pub fn err(call_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self { call_id: call_id.into(), content: msg.into(), is_error: true }
    }
}

/// Trait that every tool must implement.
///
/// Policy (`cardinality`, `requires`) is declared here but enforced by the
/// agent loop, never by the tool itself.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Vec<ParamSpec>;
    fn cardinality(&self) -> Cardinality {
        Cardinality::Unbounded
    }
    /// Names of tools of which at least one must have succeeded earlier in
    /// the run.  Empty means no prerequisite.
    fn requires(&self) -> &[&'static str] {
        &[]
    }
    /// Execute the tool.  Errors should be wrapped in [`ToolOutput::err`].
    async fn execute(&self, call: &ToolCall) -> ToolOutput;
}
