// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;

use scout_config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "scout",
    about = "Explore a web page into a test plan, then turn the plan into a browser test",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file (merged over the auto-discovered layers)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Model name, e.g. "llama3.1:8b-instruct-q5_K_M"
    #[arg(long, short = 'M', env = "SCOUT_MODEL", global = true)]
    pub model: Option<String>,

    /// Iteration ceiling for the agent loop
    #[arg(long, value_name = "N", global = true)]
    pub max_iterations: Option<u32>,

    /// Directory plans are written to
    #[arg(long, value_name = "DIR", global = true)]
    pub plans_dir: Option<String>,

    /// Directory generated tests are written to
    #[arg(long, value_name = "DIR", global = true)]
    pub tests_dir: Option<String>,

    /// Write the run's conversation to this file as JSONL
    #[arg(long, value_name = "PATH", global = true)]
    pub transcript: Option<PathBuf>,

    /// Skip the model health check before a run
    #[arg(long, global = true)]
    pub no_health_check: bool,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Explore a page and write a Markdown test plan
    Plan {
        /// Page to explore
        #[arg(value_name = "URL")]
        url: String,
        /// Extra instructions for the planner
        #[arg(long, value_name = "TEXT")]
        task: Option<String>,
    },
    /// Generate a Playwright test from a plan file
    Generate {
        /// Plan written by `scout plan`
        #[arg(value_name = "PLAN")]
        plan: PathBuf,
        /// Only this scenario, matched against the start of its `###` heading (e.g. "2")
        #[arg(long, value_name = "ID")]
        scenario: Option<String>,
    },
    /// Print the effective configuration and exit
    ShowConfig,
    /// Generate shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.model.name = model.clone();
        }
        if let Some(n) = self.max_iterations {
            config.agent.max_iterations = n;
        }
        if let Some(dir) = &self.plans_dir {
            config.output.plans_dir = dir.clone();
        }
        if let Some(dir) = &self.tests_dir {
            config.output.tests_dir = dir.clone();
        }
    }
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "scout", &mut std::io::stdout());
}
