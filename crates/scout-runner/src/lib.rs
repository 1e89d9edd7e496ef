// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod runner;
mod planner;
mod generator;
pub mod naming;
pub mod persist;
pub mod progress;
pub mod registry;

pub use runner::{Artifact, Outcome, Runner, EXIT_INTERRUPT, EXIT_RUN_FAILED, EXIT_SUCCESS};
pub use planner::{planner_task, PlanOptions};
pub use generator::{generator_task, scenario_section, start_url, GenerateOptions};
pub use registry::{build_tool_registry, ToolSetProfile};
