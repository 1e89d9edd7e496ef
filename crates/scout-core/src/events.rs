// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde_json::Value;

use crate::state::ErrorKind;

/// Events emitted while a run progresses.
/// Consumers (the CLI progress printer, tests) subscribe to drive their output.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    IterationStarted { iteration: u32 },
    /// Raw completion from the model
    ModelReply { iteration: u32, text: String },
    /// A model call failed and will be retried
    ModelRetry { attempt: u32, error: String },
    ToolCallStarted { iteration: u32, tool: String, args: Value },
    ToolCallFinished { iteration: u32, tool: String, output: String, is_error: bool },
    /// A tool call was refused by policy and not executed
    RuleViolation { iteration: u32, tool: String, reason: String },
    /// The reply could not be used; the model was told why
    Correction { iteration: u32, kind: ErrorKind, reason: String },
    Completed { iterations: u32 },
    Failed { kind: ErrorKind, message: String },
}
