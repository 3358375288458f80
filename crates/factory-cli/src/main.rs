//! Creative Factory CLI - media generation through the Kamui backend
//!
//! Generates images, videos, music and 3D models by driving the Kamui MCP
//! backend, and lists how operations are classified by the safety policy.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use factory_cli::cli_args::Cli;
use factory_cli::commands;

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}

fn run(cli: Cli) -> Result<ExitCode> {
    init_logging(&cli.log_level)?;

    if cli.list_operations {
        return commands::operations::run(cli.json);
    }

    let content_type = cli
        .content_type
        .context("--type is required unless --list-operations is given")?;

    let options = commands::generate::GenerateOptions {
        content_type,
        prompt: cli.prompt,
        output: cli.output,
        out_root: cli.out_root,
        mcp_config: cli.mcp_config,
        strict: cli.strict,
        image: cli.image,
        motion: cli.motion,
        duration: cli.duration,
        json: cli.json,
    };
    commands::generate::run(&options)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", colored::Colorize::red("error"), e);
            ExitCode::from(1)
        }
    }
}
