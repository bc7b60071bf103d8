// assay/src/cli.rs
//
// Single source of truth for all CLI definitions (Clap structs).

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "assay")]
#[command(about = "Declarative data-quality rules evaluated against tabular datasets", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluates every enabled rule of a project against its data
    Run {
        /// Project directory
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        /// Output format: table | json
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Also write the run (summary + results) to this file
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Spread rules over worker threads, whatever the project config says
        #[arg(long)]
        parallel: bool,

        /// Only print failing and warning results
        #[arg(long)]
        failures_only: bool,
    },

    /// Lints rule definitions against the data without judging rows
    Check {
        /// Project directory
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        /// Output format: table | json
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Shows the columns, shape problems and first rows of a table
    Inspect {
        /// Project directory
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        /// Table name (dataset file stem)
        #[arg(long, short)]
        table: String,

        /// Number of sample rows to display
        #[arg(long, default_value = "5")]
        limit: usize,
    },

    /// Evaluates an ad-hoc expression against one row of a table
    Eval {
        /// Expression, e.g. "amount * qty > 100"
        expression: String,

        /// Project directory
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        /// Table name (dataset file stem)
        #[arg(long, short)]
        table: String,

        /// Row index (0-based)
        #[arg(long, default_value = "0")]
        row: usize,
    },
}
