// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod parser;
mod extract;
mod conversation;
mod state;
mod events;
mod prompts;
mod agent;
#[cfg(test)]
mod tests;

pub use parser::{parse_response, FinalAnswer, ParseError, Parsed, ToolInvocation};
pub use extract::{ExtractionError, OutputContract, SectionRule, PLAN_BEGIN, PLAN_END, TEST_BEGIN, TEST_END};
pub use conversation::{cap_chars, Conversation, Observation, ObservationStatus};
pub use state::{ErrorKind, LastError, RunError, RunFailure, RunState, RunSuccess};
pub use events::AgentEvent;
pub use prompts::{protocol_reminder, system_prompt, RunKind};
pub use agent::AgentLoop;
