//! stepwise CLI and REST API entry point.
//!
//! Parses CLI arguments, loads configuration and workflow definitions, then
//! dispatches to the appropriate command handler or starts the REST API
//! server.

mod cli;
mod http;
mod state;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands, ListResource};
use state::AppState;
use stepwise_types::workflow::ExecutionStatus;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Shell completions need neither logging nor app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "stepwise", &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,stepwise_core=debug,stepwise_infra=debug",
        _ => "trace",
    };
    stepwise_observe::tracing_setup::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;

    let result = dispatch(cli).await;
    stepwise_observe::tracing_setup::shutdown_tracing();
    result
}

async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    // Validation reads a single file and needs no engine
    if let Commands::Validate { file } = &cli.command {
        cli::workflow::handle_validate(file, cli.json)?;
        return Ok(ExitCode::SUCCESS);
    }

    let state = AppState::init(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Run {
            name,
            params,
            params_file,
        } => {
            let status = cli::workflow::handle_run(
                &state,
                &name,
                params.as_deref(),
                params_file.as_deref(),
                cli.json,
                cli.quiet,
            )
            .await?;
            if status == ExecutionStatus::Failed {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::List { resource } => match resource.unwrap_or(ListResource::Workflows) {
            ListResource::Workflows => {
                cli::workflow::handle_list_workflows(&state, cli.json)?;
            }
            ListResource::Executions { workflow, limit } => {
                cli::workflow::handle_list_executions(&state, workflow, limit, cli.json).await?;
            }
        },

        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| state.config.server.host.clone());
            let port = port.unwrap_or(state.config.server.port);
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {addr}"))?;

            if !cli.quiet {
                println!(
                    "  {} stepwise API listening on {}",
                    console::style("*").green().bold(),
                    console::style(format!("http://{addr}/api/v1")).cyan()
                );
                println!(
                    "  {} workflows registered from {}",
                    state.engine.list_workflow_definitions().len(),
                    state.workflows_dir.display()
                );
                println!("  {}", console::style("Press Ctrl+C to stop").dim());
            }
            tracing::info!(%addr, "server started");

            let router = http::router::build_router(state);
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            if !cli.quiet {
                println!("\n  Server stopped.");
            }
        }

        Commands::Validate { .. } | Commands::Completions { .. } => {}
    }

    Ok(ExitCode::SUCCESS)
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
