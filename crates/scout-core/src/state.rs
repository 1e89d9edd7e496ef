// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::conversation::Conversation;
use crate::parser::FinalAnswer;

/// Classification of everything that can go wrong in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Parse,
    RuleViolation,
    Tool,
    Transport,
    Extraction,
    BudgetExceeded,
    Cancelled,
}

impl ErrorKind {
    /// Whether the loop recovers locally by telling the model.
    pub fn is_recoverable(self) -> bool {
        matches!(self, ErrorKind::Parse | ErrorKind::RuleViolation | ErrorKind::Tool | ErrorKind::Extraction)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Parse => "ParseError",
            ErrorKind::RuleViolation => "RuleViolation",
            ErrorKind::Tool => "ToolError",
            ErrorKind::Transport => "TransportError",
            ErrorKind::Extraction => "ExtractionError",
            ErrorKind::BudgetExceeded => "BudgetExceeded",
            ErrorKind::Cancelled => "Cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Bookkeeping for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunState {
    /// Completed iterations (one model reply each).
    pub iteration_count: u32,
    /// One-shot tools that have already been used.
    pub invoked_once: BTreeSet<String>,
    /// Tools with at least one successful execution.
    pub succeeded: BTreeSet<String>,
    /// Tool capabilities actually executed.
    pub tool_calls: u32,
    pub consecutive_tool_timeouts: u32,
    pub terminal: bool,
    pub last_error: Option<LastError>,
}

impl RunState {
    pub fn record_error(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.last_error = Some(LastError { kind, message: message.into() });
    }

    /// Multi-line summary for failure reports.
    pub fn summary(&self) -> String {
        let join = |s: &BTreeSet<String>| {
            if s.is_empty() { "-".to_string() } else { s.iter().cloned().collect::<Vec<_>>().join(", ") }
        };
        let mut out = format!(
            "iterations: {}\ntool calls: {}\none-shot tools used: {}\nsucceeded tools: {}\nterminal: {}\n",
            self.iteration_count,
            self.tool_calls,
            join(&self.invoked_once),
            join(&self.succeeded),
            self.terminal
        );
        if let Some(e) = &self.last_error {
            out.push_str(&format!("last error: {}: {}\n", e.kind, e.message));
        }
        out
    }
}

/// Terminal failure of a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("model unavailable after {attempts} attempts: {message}")]
    ModelUnavailable { attempts: u32, message: String },
    #[error("tool '{tool}' timed out {count} times in a row")]
    ToolTimeouts { tool: String, count: u32 },
    #[error("no valid final answer within {limit} iterations")]
    BudgetExceeded { limit: u32 },
    #[error("run cancelled")]
    Cancelled,
}

impl RunError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RunError::ModelUnavailable { .. } | RunError::ToolTimeouts { .. } => ErrorKind::Transport,
            RunError::BudgetExceeded { .. } => ErrorKind::BudgetExceeded,
            RunError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSuccess {
    /// Validated payload, ready to persist.
    pub payload: String,
    pub answer: FinalAnswer,
    pub state: RunState,
    pub conversation: Conversation,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("run failed ({}): {error}", .error.kind())]
pub struct RunFailure {
    pub error: RunError,
    pub state: RunState,
    pub conversation: Conversation,
}

impl RunFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    /// Run state, error kind and the full conversation.
    pub fn report(&self) -> String {
        format!(
            "# Run failed\n\nerror kind: {}\nerror: {}\n\n## Run state\n\n{}\n# Conversation\n\n{}",
            self.kind(),
            self.error,
            self.state.summary(),
            self.conversation.transcript()
        )
    }
}
