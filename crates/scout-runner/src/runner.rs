// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use scout_config::Config;
use scout_core::{system_prompt, AgentEvent, AgentLoop, ErrorKind, OutputContract, RunFailure, RunKind};
use scout_model::ModelClient;
use scout_tools::{PageFetcher, PageSession, ToolRegistry};

use crate::persist::{write_atomic, write_transcript};

// ── Exit codes ────────────────────────────────────────────────────────────────

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_RUN_FAILED: i32 = 1;
pub const EXIT_INTERRUPT: i32 = 130;

/// A persisted artifact.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub iterations: u32,
    pub tool_calls: u32,
}

/// Result of a run that got as far as the agent loop.
#[derive(Debug)]
pub enum Outcome {
    Written(Artifact),
    Failed(Box<RunFailure>),
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Written(_) => EXIT_SUCCESS,
            Outcome::Failed(f) if f.kind() == ErrorKind::Cancelled => EXIT_INTERRUPT,
            Outcome::Failed(_) => EXIT_RUN_FAILED,
        }
    }
}

/// Entry point for planner and generator runs.
///
/// Holds only shared, immutable collaborators; every run builds its own page
/// session, tool registry and agent loop.
pub struct Runner {
    pub(crate) config: Arc<Config>,
    model: Arc<dyn ModelClient>,
    fetcher: Arc<dyn PageFetcher>,
    events: Option<mpsc::UnboundedSender<AgentEvent>>,
}

impl Runner {
    pub fn new(config: Arc<Config>, model: Arc<dyn ModelClient>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { config, model, fetcher, events: None }
    }

    pub fn with_events(mut self, tx: mpsc::UnboundedSender<AgentEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Fresh page session; `start_url` fills in a setup call that omits its URL.
    pub(crate) fn session(&self, start_url: Option<&str>) -> Arc<PageSession> {
        let session = PageSession::new(self.fetcher.clone(), self.config.page.clone());
        Arc::new(match start_url {
            Some(url) => session.with_start_url(url),
            None => session,
        })
    }

    pub(crate) fn agent(&self, kind: RunKind, tools: ToolRegistry, contract: OutputContract) -> AgentLoop {
        let prompt = system_prompt(kind, &tools, &contract);
        let agent = AgentLoop::new(
            self.model.clone(),
            Arc::new(tools),
            Arc::new(self.config.agent.clone()),
            contract,
            prompt,
        );
        match &self.events {
            Some(tx) => agent.with_events(tx.clone()),
            None => agent,
        }
    }

    /// Run the loop and persist the payload at the path `target` derives
    /// from it.  Nothing is written for a failed run except the transcript.
    pub(crate) async fn finish(
        &self,
        agent: &AgentLoop,
        task: &str,
        cancel: &CancellationToken,
        transcript: Option<&Path>,
        target: impl FnOnce(&str) -> PathBuf,
    ) -> anyhow::Result<Outcome> {
        match agent.run(task, cancel).await {
            Ok(done) => {
                let path = target(&done.payload);
                write_atomic(&path, &done.payload)?;
                if let Some(t) = transcript {
                    write_transcript(t, &done.conversation)?;
                }
                info!(path = %path.display(), iterations = done.state.iteration_count, "artifact saved");
                Ok(Outcome::Written(Artifact {
                    path,
                    iterations: done.state.iteration_count,
                    tool_calls: done.state.tool_calls,
                }))
            }
            Err(failure) => {
                warn!(kind = %failure.kind(), "run failed, nothing written");
                if let Some(t) = transcript {
                    write_transcript(t, &failure.conversation)?;
                }
                Ok(Outcome::Failed(Box::new(failure)))
            }
        }
    }
}
