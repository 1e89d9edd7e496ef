// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use scout_config::AgentConfig;
use scout_model::{Message, ModelClient, ModelError};
use scout_tools::{Cardinality, ToolCall, ToolRegistry};

use crate::conversation::{Conversation, Observation, ObservationStatus};
use crate::events::AgentEvent;
use crate::extract::OutputContract;
use crate::parser::{parse_response, FinalAnswer, Parsed, ToolInvocation};
use crate::prompts::protocol_reminder;
use crate::state::{ErrorKind, RunError, RunFailure, RunState, RunSuccess};

/// Where the loop is within one iteration.
#[derive(Debug)]
enum Phase {
    AwaitingModel,
    Parsing(String),
    Executing(ToolInvocation),
    Observing(Observation),
    Terminated(FinalAnswer),
}

/// Drives one model through the tool loop until a valid final answer,
/// a hard limit, or cancellation.
///
/// The loop itself is stateless between runs: every call to [`run`] owns a
/// fresh [`Conversation`] and [`RunState`], so one `AgentLoop` can serve
/// several concurrent runs over the same registry and model client.
///
/// [`run`]: AgentLoop::run
pub struct AgentLoop {
    model: Arc<dyn ModelClient>,
    tools: Arc<ToolRegistry>,
    config: Arc<AgentConfig>,
    contract: OutputContract,
    system_prompt: String,
    events: Option<mpsc::UnboundedSender<AgentEvent>>,
}

impl AgentLoop {
    pub fn new(
        model: Arc<dyn ModelClient>,
        tools: Arc<ToolRegistry>,
        config: Arc<AgentConfig>,
        contract: OutputContract,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self { model, tools, config, contract, system_prompt: system_prompt.into(), events: None }
    }

    /// Emit progress events on `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<AgentEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(event);
        }
    }

    pub async fn run(&self, task: &str, cancel: &CancellationToken) -> Result<RunSuccess, RunFailure> {
        let mut conversation = Conversation::new();
        conversation.push(Message::system(self.system_prompt.clone()));
        conversation.push(Message::user(task));
        let mut state = RunState::default();

        info!(
            model = self.model.model_name(),
            max_iterations = self.config.max_iterations,
            tools = self.tools.names().len(),
            "agent run started"
        );

        let mut phase = Phase::AwaitingModel;
        loop {
            let iteration = state.iteration_count + 1;
            phase = match phase {
                Phase::AwaitingModel => {
                    if cancel.is_cancelled() {
                        return Err(self.fail(RunError::Cancelled, state, conversation));
                    }
                    if state.iteration_count >= self.config.max_iterations {
                        let error = RunError::BudgetExceeded { limit: self.config.max_iterations };
                        return Err(self.fail(error, state, conversation));
                    }
                    debug!(iteration, turns = conversation.len(), "awaiting model");
                    self.emit(AgentEvent::IterationStarted { iteration });
                    match self.call_model(&conversation, cancel).await {
                        Ok(text) => Phase::Parsing(text),
                        Err(error) => return Err(self.fail(error, state, conversation)),
                    }
                }

                Phase::Parsing(raw) => {
                    self.emit(AgentEvent::ModelReply { iteration, text: raw.clone() });
                    let parsed = parse_response(&raw, &self.tools);
                    conversation.push(Message::assistant(raw));
                    match parsed {
                        Parsed::ToolInvocation(inv) => Phase::Executing(inv),
                        Parsed::FinalAnswer(answer) => Phase::Terminated(answer),
                        Parsed::Malformed(err) => {
                            warn!(iteration, error = %err, "malformed model reply");
                            let reason = err.to_string();
                            state.record_error(ErrorKind::Parse, reason.clone());
                            self.emit(AgentEvent::Correction { iteration, kind: ErrorKind::Parse, reason: reason.clone() });
                            Phase::Observing(Observation::new(
                                None,
                                iteration,
                                ObservationStatus::FormatError,
                                format!("{reason}\n{}", protocol_reminder()),
                            ))
                        }
                    }
                }

                Phase::Executing(inv) => match self.execute(inv, iteration, &mut state).await {
                    Ok(obs) => Phase::Observing(obs),
                    Err(error) => return Err(self.fail(error, state, conversation)),
                },

                Phase::Observing(obs) => {
                    conversation.push(Message::observation(obs.render(self.config.observation_char_cap)));
                    state.iteration_count += 1;
                    Phase::AwaitingModel
                }

                Phase::Terminated(answer) => match self.contract.extract(&answer) {
                    Ok(payload) => {
                        state.iteration_count += 1;
                        state.terminal = true;
                        info!(iterations = state.iteration_count, bytes = payload.len(), "agent run completed");
                        self.emit(AgentEvent::Completed { iterations: state.iteration_count });
                        return Ok(RunSuccess { payload, answer, state, conversation });
                    }
                    Err(err) => {
                        warn!(iteration, error = %err, "final answer rejected");
                        let reason = err.to_string();
                        state.record_error(ErrorKind::Extraction, reason.clone());
                        self.emit(AgentEvent::Correction {
                            iteration,
                            kind: ErrorKind::Extraction,
                            reason: reason.clone(),
                        });
                        Phase::Observing(Observation::new(
                            None,
                            iteration,
                            ObservationStatus::FormatError,
                            format!("Your final answer was not accepted: {reason}.\n{}", self.contract.reminder()),
                        ))
                    }
                },
            };
        }
    }

    /// One model call with timeout and retries.  Cancellation interrupts the
    /// wait; the completion of an abandoned call is discarded.
    async fn call_model(&self, conversation: &Conversation, cancel: &CancellationToken) -> Result<String, RunError> {
        let attempts = self.config.model_retry_budget + 1;
        let limit = Duration::from_secs(self.config.model_timeout_secs);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let call = tokio::time::timeout(limit, self.model.complete(conversation.messages()));
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RunError::Cancelled),
                r = call => r,
            };
            last_error = match result {
                Ok(Ok(text)) => return Ok(text),
                Ok(Err(e)) => e.to_string(),
                Err(_) => ModelError::Timeout(self.config.model_timeout_secs).to_string(),
            };
            if attempt < attempts {
                warn!(attempt, error = %last_error, "model call failed, retrying");
                self.emit(AgentEvent::ModelRetry { attempt, error: last_error.clone() });
                let backoff = Duration::from_millis(self.config.retry_backoff_ms.saturating_mul(u64::from(attempt)));
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(RunError::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
        }
        Err(RunError::ModelUnavailable { attempts, message: last_error })
    }

    /// Policy check, then dispatch.  Only a tool timeout streak is fatal.
    async fn execute(&self, inv: ToolInvocation, iteration: u32, state: &mut RunState) -> Result<Observation, RunError> {
        let name = inv.tool.clone();
        let Some(spec) = self.tools.spec(&name) else {
            // The parser already rejects unknown names.
            let reason = format!("unknown tool '{name}'. Available: {}", self.tools.names().join(", "));
            state.record_error(ErrorKind::Parse, reason.clone());
            return Ok(Observation::new(None, iteration, ObservationStatus::FormatError, reason));
        };

        if spec.cardinality == Cardinality::Once && state.invoked_once.contains(&name) {
            let reason = format!("'{name}' may only be called once per run and has already been called. Continue with the other tools.");
            return Ok(self.rule_violation(&name, iteration, reason, state));
        }
        if !spec.requires.is_empty() && !spec.requires.iter().any(|r| state.succeeded.contains(*r)) {
            let reason = format!("'{name}' needs a successful call to {} first.", spec.requires.join(" or "));
            return Ok(self.rule_violation(&name, iteration, reason, state));
        }

        let args = serde_json::Value::Object(inv.args.clone());
        debug!(iteration, tool = %name, %args, "executing tool");
        self.emit(AgentEvent::ToolCallStarted { iteration, tool: name.clone(), args });

        let call = ToolCall::new(format!("it{iteration}"), name.clone(), inv.args);
        let limit = Duration::from_secs(self.config.tool_timeout_secs);
        state.tool_calls += 1;
        let output = match tokio::time::timeout(limit, self.tools.execute(&call)).await {
            Ok(output) => output,
            Err(_) => {
                state.consecutive_tool_timeouts += 1;
                let reason = format!("'{name}' did not finish within {}s", self.config.tool_timeout_secs);
                warn!(iteration, tool = %name, streak = state.consecutive_tool_timeouts, "tool timed out");
                state.record_error(ErrorKind::Transport, reason.clone());
                self.emit(AgentEvent::ToolCallFinished {
                    iteration,
                    tool: name.clone(),
                    output: reason.clone(),
                    is_error: true,
                });
                if state.consecutive_tool_timeouts > self.config.tool_retry_budget {
                    return Err(RunError::ToolTimeouts { tool: name, count: state.consecutive_tool_timeouts });
                }
                return Ok(Observation::new(Some(&name), iteration, ObservationStatus::Timeout, reason));
            }
        };
        state.consecutive_tool_timeouts = 0;

        self.emit(AgentEvent::ToolCallFinished {
            iteration,
            tool: name.clone(),
            output: output.content.clone(),
            is_error: output.is_error,
        });

        if output.is_error {
            debug!(iteration, tool = %name, "tool returned an error");
            state.record_error(ErrorKind::Tool, output.content.clone());
            return Ok(Observation::new(Some(&name), iteration, ObservationStatus::ToolError, output.content));
        }

        if spec.cardinality == Cardinality::Once {
            state.invoked_once.insert(name.clone());
        }
        state.succeeded.insert(name.clone());
        Ok(Observation::new(Some(&name), iteration, ObservationStatus::Ok, output.content))
    }

    fn rule_violation(&self, tool: &str, iteration: u32, reason: String, state: &mut RunState) -> Observation {
        warn!(iteration, tool, "rule violation: {reason}");
        state.record_error(ErrorKind::RuleViolation, reason.clone());
        self.emit(AgentEvent::RuleViolation { iteration, tool: tool.to_string(), reason: reason.clone() });
        Observation::new(Some(tool), iteration, ObservationStatus::RuleViolation, reason)
    }

    fn fail(&self, error: RunError, mut state: RunState, conversation: Conversation) -> RunFailure {
        warn!(iterations = state.iteration_count, error = %error, "agent run failed");
        state.terminal = true;
        state.record_error(error.kind(), error.to_string());
        self.emit(AgentEvent::Failed { kind: error.kind(), message: error.to_string() });
        RunFailure { error, state, conversation }
    }
}
