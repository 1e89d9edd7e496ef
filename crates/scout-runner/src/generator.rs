// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{bail, Context};
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use scout_core::{OutputContract, RunKind};

use crate::naming::test_file_name;
use crate::registry::{build_tool_registry, ToolSetProfile};
use crate::runner::{Outcome, Runner};

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Plan file written by a planner run.
    pub plan: PathBuf,
    /// Only generate the `### <ID> …` scenario.
    pub scenario: Option<String>,
    pub transcript: Option<PathBuf>,
}

fn heading_level(line: &str) -> Option<usize> {
    let t = line.trim_start();
    let level = t.chars().take_while(|&c| c == '#').count();
    let rest = &t[level..];
    ((1..=6).contains(&level) && (rest.is_empty() || rest.starts_with(' '))).then_some(level)
}

fn heading_matches(line: &str, id: &str) -> bool {
    let text = line.trim_start().trim_start_matches('#').trim();
    let id = id.trim();
    if id.is_empty() || text.len() < id.len() || !text.is_char_boundary(id.len()) {
        return false;
    }
    let (head, tail) = text.split_at(id.len());
    head.eq_ignore_ascii_case(id) && !tail.chars().next().is_some_and(|c| c.is_alphanumeric())
}

/// The `### <id> …` section of a plan, up to the next heading of level 3 or
/// higher.  `id` matches the start of the heading text: `2` finds
/// `### 2. Checkout` but not `### 21. Refunds`.
pub fn scenario_section<'a>(plan: &'a str, id: &str) -> Option<&'a str> {
    let mut start = None;
    let mut offset = 0;
    for line in plan.split_inclusive('\n') {
        match (start, heading_level(line)) {
            (None, Some(3)) if heading_matches(line, id) => start = Some(offset),
            (Some(s), Some(level)) if level <= 3 => return Some(plan[s..offset].trim()),
            _ => {}
        }
        offset += line.len();
    }
    start.map(|s| plan[s..].trim())
}

fn url_re() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r#"https?://[^\s)\]>'"`]+"#).unwrap_or_else(|e| panic!("url regex: {e}")))
}

/// First absolute URL mentioned in the text.
pub fn start_url(text: &str) -> Option<&str> {
    url_re().find(text).map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':']))
}

/// First user turn of a generator run.
pub fn generator_task(plan_text: &str, url: Option<&str>) -> String {
    let setup = match url {
        Some(url) => format!("Start by calling generator_setup_page with url \"{url}\"."),
        None => "Start by calling generator_setup_page with the start URL of the scenario.".to_string(),
    };
    format!(
        "Generate a Playwright test for the test plan scenario below.\n{setup}\n\n\
         --- TEST PLAN ---\n{}\n--- END TEST PLAN ---",
        plan_text.trim()
    )
}

impl Runner {
    /// Turn a plan (or one scenario of it) into `<tests_dir>/<slug>.spec.ts`.
    pub async fn generate(&self, opts: GenerateOptions, cancel: &CancellationToken) -> anyhow::Result<Outcome> {
        let plan = std::fs::read_to_string(&opts.plan)
            .with_context(|| format!("reading plan {}", opts.plan.display()))?;
        let text = match opts.scenario.as_deref() {
            Some(id) => match scenario_section(&plan, id) {
                Some(section) => section,
                None => bail!("no scenario '### {id} …' in {}", opts.plan.display()),
            },
            None => plan.as_str(),
        };
        if text.trim().is_empty() {
            bail!("plan {} is empty", opts.plan.display());
        }
        // Scenario sections rarely repeat the page URL; fall back to the whole plan.
        let url = start_url(text).or_else(|| start_url(&plan));
        info!(plan = %opts.plan.display(), scenario = ?opts.scenario, url = ?url, "starting generator run");

        let tests_dir = self.config.output.tests_path();
        let tools = build_tool_registry(self.session(url), ToolSetProfile::Generator);
        let agent = self.agent(RunKind::Generator, tools, OutputContract::test_script());
        let task = generator_task(text, url);
        self.finish(&agent, &task, cancel, opts.transcript.as_deref(), |payload| {
            tests_dir.join(test_file_name(payload))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = "# Shop Test Plan\n\n## Application Overview\n\nShop at https://shop.test/.\n\n\
                        ## Test Scenarios\n\n### 1. Search\n\n**Steps:**\n1. Type a query\n\n\
                        #### Notes\nkeep\n\n### 2. Checkout\n\n1. Pay\n\n### 21. Refunds\n\n1. Refund\n";

    #[test]
    fn section_runs_to_next_scenario() {
        let s = scenario_section(PLAN, "1").unwrap();
        assert!(s.starts_with("### 1. Search"));
        assert!(s.contains("#### Notes\nkeep"));
        assert!(!s.contains("Checkout"));
    }

    #[test]
    fn id_does_not_match_longer_number() {
        let s = scenario_section(PLAN, "2").unwrap();
        assert!(s.starts_with("### 2. Checkout"));
        assert!(!s.contains("Refunds"));
        assert_eq!(scenario_section(PLAN, "21").unwrap(), "### 21. Refunds\n\n1. Refund");
    }

    #[test]
    fn id_may_be_title_text() {
        assert!(scenario_section(PLAN, "2. checkout").is_some());
        assert!(scenario_section(PLAN, "7").is_none());
    }

    #[test]
    fn start_url_strips_sentence_punctuation() {
        assert_eq!(start_url(PLAN), Some("https://shop.test/"));
        assert_eq!(start_url("no links"), None);
    }

    #[test]
    fn task_embeds_plan_and_url() {
        let task = generator_task("### 1. Search", Some("https://shop.test/"));
        assert!(task.contains("generator_setup_page with url \"https://shop.test/\""));
        assert!(task.contains("--- TEST PLAN ---\n### 1. Search\n--- END TEST PLAN ---"));
    }
}
