// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use scout_tools::{Cardinality, ToolRegistry};

use crate::extract::OutputContract;

/// Which artifact a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Planner,
    Generator,
}

const PROTOCOL: &str = "\
You work in a loop. Every reply must contain exactly ONE of these blocks:

1. A tool call, to act and then read the result:
<tool_call>{\"tool\": \"<tool name>\", \"input\": {<arguments>}}</tool_call>

2. The final answer, once the task is complete:
<final_answer>…</final_answer>

Rules:
- One tool call per reply. The result comes back in an <observation> block; read it before the next step.
- Never put a tool call and a final answer in the same reply.
- Use only the tools listed below with exactly the listed parameters (? marks optional ones).
- Tools marked [once] may be called a single time per run.
- Tools marked [after: …] work only after one of the named tools has succeeded.
- An observation with status='format-error' or 'rule-violation' explains what to fix; fix it and continue.";

const PLANNER_ROLE: &str = "\
You are a senior QA engineer. Explore the web application at the given URL and write a \
structured Markdown test plan for it.

Workflow:
1. Call planner_setup_page with the URL, exactly once.
2. Call browser_snapshot to see the page text and its interactive elements.
3. Explore the main user flows with the browser tools: follow links, inspect forms, verify key texts.
4. When you understand the page, write the plan.

The plan must contain an \"## Application Overview\" section describing the page and its purpose, \
and a \"## Test Scenarios\" section with numbered scenarios (### 1. <title>), each listing its \
assumptions, numbered steps and expected results.";

const GENERATOR_ROLE: &str = "\
You are a test automation engineer. Turn the test plan scenario you are given into one \
Playwright test written in TypeScript.

Workflow:
1. Call generator_setup_page with the start URL of the scenario, exactly once.
2. Call browser_snapshot to find element ids, then perform every step of the scenario with the \
browser tools. Check each expected result with browser_verify_text_visible.
3. Call generator_read_log. It lists every recorded action with the code that reproduces it.
4. Write the test from that code.

The test must be a single test('<scenario name>', async ({ page }) => { … }) (optionally inside \
test.describe), with a numbered comment before each step (// 1. …, // 2. …), importing test and \
expect from '@playwright/test'.";

fn tool_section(tools: &ToolRegistry) -> String {
    let mut out = String::from("Available tools:\n");
    for spec in tools.specs() {
        let mut line = format!("- {}", spec.signature());
        if spec.cardinality == Cardinality::Once {
            line.push_str(" [once]");
        }
        if !spec.requires.is_empty() {
            line.push_str(&format!(" [after: {}]", spec.requires.join(" or ")));
        }
        line.push_str(&format!(": {}\n", spec.description));
        out.push_str(&line);
    }
    out
}

fn output_section(kind: RunKind, contract: &OutputContract) -> String {
    let skeleton = match kind {
        RunKind::Planner => "\
# <Application name> Test Plan

## Application Overview

<what the page is and does>

## Test Scenarios

### 1. <Scenario title>

**Steps:**
1. <step>

**Expected Results:**
- <result>",
        RunKind::Generator => "\
import { test, expect } from '@playwright/test';

test.describe('<Feature>', () => {
  test('<Scenario name>', async ({ page }) => {
    // 1. <step>
    <code from the log>
  });
});",
    };
    format!(
        "When you are done, reply with the document between the markers, inside the final answer:\n\n\
         <final_answer>\n{}\n{}\n{}\n</final_answer>",
        contract.begin, skeleton, contract.end
    )
}

/// System prompt for a run: role, protocol, tool list and output format.
pub fn system_prompt(kind: RunKind, tools: &ToolRegistry, contract: &OutputContract) -> String {
    let role = match kind {
        RunKind::Planner => PLANNER_ROLE,
        RunKind::Generator => GENERATOR_ROLE,
    };
    format!(
        "{role}\n\n{PROTOCOL}\n\n{}\n{}",
        tool_section(tools),
        output_section(kind, contract)
    )
}

/// Short protocol restatement appended to format corrections.
pub fn protocol_reminder() -> &'static str {
    "Reply with exactly one <tool_call>{\"tool\": \"…\", \"input\": {…}}</tool_call> \
     or one <final_answer>…</final_answer> block."
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use scout_config::PageConfig;
    use scout_tools::{PageSession, PlannerSetupPageTool, SnapshotTool, StaticFetcher};

    use super::*;

    fn tools() -> ToolRegistry {
        let session = Arc::new(PageSession::new(Arc::new(StaticFetcher::new()), PageConfig::default()));
        let mut reg = ToolRegistry::new();
        reg.register(PlannerSetupPageTool(session.clone()));
        reg.register(SnapshotTool(session));
        reg
    }

    #[test]
    fn planner_prompt_lists_tools_with_policy() {
        let p = system_prompt(RunKind::Planner, &tools(), &OutputContract::plan());
        assert!(p.contains("- planner_setup_page(url: string) [once]:"));
        assert!(p.contains("- browser_snapshot() [after: planner_setup_page or generator_setup_page]:"));
        assert!(p.contains("<<<BEGIN_PLAN_MD>>>"));
        assert!(p.contains("## Test Scenarios"));
    }

    #[test]
    fn generator_prompt_uses_test_markers() {
        let p = system_prompt(RunKind::Generator, &tools(), &OutputContract::test_script());
        assert!(p.contains("<<<BEGIN_TEST>>>"));
        assert!(p.contains("generator_read_log"));
        assert!(!p.contains("<<<BEGIN_PLAN_MD>>>"));
    }
}
