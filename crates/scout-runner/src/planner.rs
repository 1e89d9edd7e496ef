// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use anyhow::{bail, Context};
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

use scout_core::{OutputContract, RunKind};
use scout_tools::Workspace;

use crate::naming::plan_file_name;
use crate::registry::{build_tool_registry, ToolSetProfile};
use crate::runner::{Outcome, Runner};

#[derive(Debug, Clone)]
pub struct PlanOptions {
    /// Page to explore.
    pub url: String,
    /// Extra instructions appended to the task.
    pub task: Option<String>,
    /// Root for the file-system tools.
    pub workspace: PathBuf,
    /// Write the conversation here as JSONL.
    pub transcript: Option<PathBuf>,
}

/// First user turn of a planner run.
pub fn planner_task(url: &Url, extra: Option<&str>) -> String {
    let mut task = format!(
        "Explore the web page at {url} and write a test plan for it.\n\
         Start by calling planner_setup_page with url \"{url}\"."
    );
    if let Some(extra) = extra.map(str::trim).filter(|s| !s.is_empty()) {
        task.push_str("\n\nAdditional instructions:\n");
        task.push_str(extra);
    }
    task
}

impl Runner {
    /// Explore `opts.url` and save the plan as `<plans_dir>/<domain>-<page>-plan.md`.
    pub async fn plan(&self, opts: PlanOptions, cancel: &CancellationToken) -> anyhow::Result<Outcome> {
        let url = Url::parse(opts.url.trim()).with_context(|| format!("invalid URL '{}'", opts.url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("unsupported URL scheme '{}': expected http or https", url.scheme());
        }
        let path = self.config.output.plans_path().join(plan_file_name(&url));
        info!(url = %url, plan = %path.display(), "starting planner run");

        // The plan only reaches disk after it passes validation.
        let workspace = Workspace::new(opts.workspace)
            .reserve(self.config.output.plans_path())
            .reserve(self.config.output.tests_path());
        let tools = build_tool_registry(self.session(Some(url.as_str())), ToolSetProfile::Planner { workspace });
        let agent = self.agent(RunKind::Planner, tools, OutputContract::plan());
        let task = planner_task(&url, opts.task.as_deref());
        self.finish(&agent, &task, cancel, opts.transcript.as_deref(), |_| path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_names_url_and_setup_tool() {
        let url = Url::parse("https://shop.test/").unwrap();
        let task = planner_task(&url, None);
        assert!(task.contains("https://shop.test/"));
        assert!(task.contains("planner_setup_page"));
        assert!(!task.contains("Additional instructions"));
    }

    #[test]
    fn extra_task_text_is_appended() {
        let url = Url::parse("https://shop.test/").unwrap();
        let task = planner_task(&url, Some("  Focus on checkout.  "));
        assert!(task.ends_with("Additional instructions:\nFocus on checkout."));
        assert_eq!(planner_task(&url, Some("   ")), planner_task(&url, None));
    }
}
