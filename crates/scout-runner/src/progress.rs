// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use scout_core::AgentEvent;

/// Write a diagnostic / progress line to stderr (never pollutes stdout).
pub fn write_stderr(msg: &str) {
    eprintln!("{msg}");
}

/// One stderr line per event; `None` for events too noisy to print.
pub fn describe(event: &AgentEvent) -> Option<String> {
    match event {
        AgentEvent::IterationStarted { iteration } => Some(format!("[scout:iteration] {iteration}")),
        AgentEvent::ModelReply { .. } => None,
        AgentEvent::ModelRetry { attempt, error } => {
            Some(format!("[scout:model:retry] attempt={attempt} error={error:?}"))
        }
        AgentEvent::ToolCallStarted { tool, args, .. } => {
            Some(format!("[scout:tool:call] name=\"{tool}\" args={args}"))
        }
        AgentEvent::ToolCallFinished { tool, output, is_error, .. } => Some(if *is_error {
            format!("[scout:tool:result] name=\"{tool}\" success=false output={output:?}")
        } else {
            format!("[scout:tool:result] name=\"{tool}\" success=true size={}", output.len())
        }),
        AgentEvent::RuleViolation { tool, reason, .. } => {
            Some(format!("[scout:rule-violation] name=\"{tool}\" {reason}"))
        }
        AgentEvent::Correction { kind, reason, .. } => Some(format!("[scout:correction] {kind}: {reason}")),
        AgentEvent::Completed { iterations } => Some(format!("[scout:completed] iterations={iterations}")),
        AgentEvent::Failed { kind, message } => Some(format!("[scout:failed] {kind}: {message}")),
    }
}

/// Print events until every sender is dropped.
pub fn spawn_printer(mut rx: mpsc::UnboundedReceiver<AgentEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Some(line) = describe(&event) {
                write_stderr(&line);
            }
        }
    })
}
