// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use scout_runner::progress::{spawn_printer, write_stderr};
use scout_runner::{GenerateOptions, Outcome, PlanOptions, Runner, EXIT_SUCCESS};
use scout_tools::{HttpFetcher, PageFetcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Commands::Completions { shell } = &cli.command {
        cli::print_completions(*shell);
        return Ok(());
    }

    let mut config = scout_config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    if let Commands::ShowConfig = &cli.command {
        println!("{}", serde_yaml::to_string(&config).context("serializing config")?);
        return Ok(());
    }

    let config = Arc::new(config);
    let model = scout_model::from_config(&config.model)?;
    // The mock replays a fixed script; a probe would consume its first reply.
    if !cli.no_health_check && config.model.provider != "mock" {
        model.health_check().await.with_context(|| {
            format!("model '{}' is not reachable through the {} provider", model.model_name(), model.name())
        })?;
    }
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(&config.page)?);

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = spawn_printer(rx);
    let runner = Runner::new(config.clone(), model, fetcher).with_events(tx);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                write_stderr("[scout] interrupted, stopping before the next step");
                cancel.cancel();
            }
        });
    }

    let transcript = cli.transcript.clone();
    let outcome = match cli.command {
        Commands::Plan { url, task } => {
            let workspace = std::env::current_dir().context("resolving current directory")?;
            runner.plan(PlanOptions { url, task, workspace, transcript }, &cancel).await
        }
        Commands::Generate { plan, scenario } => {
            runner.generate(GenerateOptions { plan, scenario, transcript }, &cancel).await
        }
        Commands::ShowConfig | Commands::Completions { .. } => return Ok(()),
    };

    // Closing the last sender lets the printer drain and finish.
    drop(runner);
    let _ = printer.await;

    let outcome = outcome?;
    match &outcome {
        Outcome::Written(artifact) => println!("{}", artifact.path.display()),
        Outcome::Failed(failure) => write_stderr(&failure.report()),
    }
    let code = outcome.exit_code();
    if code != EXIT_SUCCESS {
        std::process::exit(code);
    }
    Ok(())
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
