// assay/src/main.rs

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> miette::Result<()> {
    // RUST_LOG=debug assay run ... to see per-rule details
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            project_dir,
            format,
            output,
            parallel,
            failures_only,
        } => commands::run::execute(project_dir, format, output, parallel, failures_only).await,
        Commands::Check {
            project_dir,
            format,
        } => commands::check::execute(project_dir, format).await,
        Commands::Inspect {
            project_dir,
            table,
            limit,
        } => commands::inspect::execute(project_dir, table, limit).await,
        Commands::Eval {
            expression,
            project_dir,
            table,
            row,
        } => commands::eval::execute(project_dir, expression, table, row).await,
    };

    result.map_err(|e| miette::miette!("{:#}", e))
}
