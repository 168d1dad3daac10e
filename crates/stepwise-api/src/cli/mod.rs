//! CLI command definitions for the `stepwise` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod workflow;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Run declarative multi-step workflows.
#[derive(Parser)]
#[command(name = "stepwise", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for engine debug logs, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config.toml (defaults to $STEPWISE_DATA_DIR/config.toml).
    #[arg(long, global = true, env = "STEPWISE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a registered workflow to completion and print the execution.
    Run {
        /// Workflow name.
        name: String,

        /// Initial parameters as a JSON object.
        #[arg(long, conflicts_with = "params_file")]
        params: Option<String>,

        /// Read initial parameters from a JSON file.
        #[arg(long)]
        params_file: Option<PathBuf>,
    },

    /// List workflows or executions.
    #[command(alias = "ls")]
    List {
        #[command(subcommand)]
        resource: Option<ListResource>,
    },

    /// Parse and validate a workflow definition file.
    Validate {
        /// Path to a `.yaml`, `.yml` or `.json` definition.
        file: PathBuf,
    },

    /// Start the REST API server.
    Serve {
        /// Host to bind to (defaults to `server.host` from config).
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (defaults to `server.port` from config).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand, Clone)]
pub enum ListResource {
    /// Registered workflow definitions.
    Workflows,

    /// Executions recorded by this process.
    Executions {
        /// Only show executions of this workflow.
        #[arg(long)]
        workflow: Option<String>,

        /// Maximum number of executions to display.
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_params() {
        let cli = Cli::parse_from([
            "stepwise",
            "--json",
            "run",
            "onboard",
            "--params",
            r#"{"email":"a@b.c"}"#,
        ]);
        assert!(cli.json);
        match cli.command {
            Commands::Run { name, params, params_file } => {
                assert_eq!(name, "onboard");
                assert_eq!(params.as_deref(), Some(r#"{"email":"a@b.c"}"#));
                assert!(params_file.is_none());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_params_and_params_file_conflict() {
        let result = Cli::try_parse_from([
            "stepwise",
            "run",
            "onboard",
            "--params",
            "{}",
            "--params-file",
            "p.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_list_executions() {
        let cli = Cli::parse_from(["stepwise", "ls", "executions", "--workflow", "onboard"]);
        match cli.command {
            Commands::List {
                resource: Some(ListResource::Executions { workflow, limit }),
            } => {
                assert_eq!(workflow.as_deref(), Some("onboard"));
                assert_eq!(limit, 20);
            }
            _ => panic!("expected list executions"),
        }
    }
}
