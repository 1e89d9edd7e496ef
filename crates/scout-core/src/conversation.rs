// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::Serialize;

use scout_model::{Message, Role};

/// Ordered, append-only record of one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Conversation {
    turns: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, msg: Message) {
        self.turns.push(msg);
    }

    pub fn messages(&self) -> &[Message] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.turns.last()
    }

    /// Number of turns with the given role.
    pub fn count(&self, role: Role) -> usize {
        self.turns.iter().filter(|m| m.role == role).count()
    }

    /// One JSON object per line.
    pub fn to_jsonl(&self) -> String {
        self.turns
            .iter()
            .filter_map(|m| serde_json::to_string(m).ok())
            .map(|line| line + "\n")
            .collect()
    }

    /// Human-readable transcript used in failure reports.
    pub fn transcript(&self) -> String {
        let mut out = String::new();
        for (i, m) in self.turns.iter().enumerate() {
            let role = match m.role {
                Role::System => "System",
                Role::User => "User",
                Role::Assistant => "Assistant",
                Role::Observation => "Observation",
            };
            out.push_str(&format!("## [{}] {}\n\n{}\n\n", i + 1, role, m.content.trim_end()));
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObservationStatus {
    Ok,
    ToolError,
    RuleViolation,
    FormatError,
    Timeout,
}

impl ObservationStatus {
    fn as_str(self) -> &'static str {
        match self {
            ObservationStatus::Ok => "ok",
            ObservationStatus::ToolError => "error",
            ObservationStatus::RuleViolation => "rule-violation",
            ObservationStatus::FormatError => "format-error",
            ObservationStatus::Timeout => "timeout",
        }
    }
}

/// What the model is told after one iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Originating tool; `None` for corrections about the reply itself.
    pub tool: Option<String>,
    pub iteration: u32,
    pub status: ObservationStatus,
    pub text: String,
}

impl Observation {
    pub fn new(tool: Option<&str>, iteration: u32, status: ObservationStatus, text: impl Into<String>) -> Self {
        Self { tool: tool.map(str::to_string), iteration, status, text: text.into() }
    }

    /// Rendered turn content, with the body cut to `cap` characters.
    pub fn render(&self, cap: usize) -> String {
        format!(
            "<observation tool='{}' iteration='{}' status='{}'>\n{}\n</observation>",
            self.tool.as_deref().unwrap_or("none"),
            self.iteration,
            self.status.as_str(),
            cap_chars(self.text.trim_end(), cap)
        )
    }
}

/// Keep the head and tail of an over-long text.
pub fn cap_chars(text: &str, cap: usize) -> String {
    let total = text.chars().count();
    if total <= cap || cap == 0 {
        return text.to_string();
    }
    let head = cap * 2 / 3;
    let tail = cap - head;
    let start: String = text.chars().take(head).collect();
    let end: String = text.chars().skip(total - tail).collect();
    format!("{start}\n…[{} characters omitted]…\n{end}", total - head - tail)
}
