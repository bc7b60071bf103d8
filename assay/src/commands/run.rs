// assay/src/commands/run.rs
//
// USE CASE: Evaluate a project's rules against its data.

use anyhow::Context;
use std::path::PathBuf;
use tracing::debug;

use assay_core::application::{ProjectRun, load_project, run_project};
use assay_core::infrastructure::fs::atomic_write;
use assay_core::infrastructure::store::{FileRuleRepository, JsonDatasetSource};

use super::new_table;
use crate::cli::OutputFormat;

pub async fn execute(
    project_dir: PathBuf,
    format: OutputFormat,
    output: Option<PathBuf>,
    parallel: bool,
    failures_only: bool,
) -> anyhow::Result<()> {
    let start = std::time::Instant::now();

    let mut project = load_project(
        &project_dir,
        &FileRuleRepository::new(),
        &JsonDatasetSource::new(),
    )
    .await
    .with_context(|| format!("Failed to load project from {:?}", project_dir))?;
    if parallel {
        project.config.parallel = true;
    }
    debug!(
        rules = project.rules.len(),
        tables = project.tables.len(),
        parallel = project.config.parallel,
        "Project loaded"
    );

    for rejected in &project.rejected {
        eprintln!(
            "warning: skipped rule document #{} ({}): {}",
            rejected.index,
            rejected.id.as_deref().unwrap_or("no id"),
            rejected.reason
        );
    }

    let run = run_project(&project, true).context("Validation run failed")?;

    if let Some(path) = &output {
        let json = serde_json::to_string_pretty(&run)?;
        atomic_write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&run)?),
        OutputFormat::Table => {
            println!(
                "Project: {} (v{})",
                project.config.name, project.config.version
            );
            print_results(&run, failures_only);
            print_summary(&run);
            println!("Finished in {:.2?}", start.elapsed());
        }
    }

    if !run.success {
        std::process::exit(1);
    }
    Ok(())
}

fn print_results(run: &ProjectRun, failures_only: bool) {
    let mut table = new_table(&["Rule", "Table", "Row", "Severity", "Message"]);
    let mut shown = 0;
    for result in &run.results {
        if failures_only && result.is_success() {
            continue;
        }
        let row = match (result.row_index, &result.group) {
            (Some(i), Some(g)) => format!("{} ({})", i, g),
            (Some(i), None) => i.to_string(),
            (None, _) => "-".to_string(),
        };
        table.add_row(vec![
            result.rule_id.clone(),
            result.table.clone(),
            row,
            result.severity.to_string(),
            result.message.clone(),
        ]);
        shown += 1;
    }
    if shown > 0 {
        println!("{table}");
    }
}

fn print_summary(run: &ProjectRun) {
    let mut table = new_table(&["Rule", "Table", "Passed", "Failed", "Warnings"]);
    for rule in &run.summary.rules {
        table.add_row(vec![
            rule.rule_id.clone(),
            rule.table.clone(),
            rule.passed.to_string(),
            rule.failed.to_string(),
            rule.warnings.to_string(),
        ]);
    }
    println!("{table}");

    let verdict = if run.success { "PASS" } else { "FAIL" };
    println!(
        "{}: {} passed, {} failed, {} warnings",
        verdict, run.summary.passed, run.summary.failed, run.summary.warnings
    );
    if let Some(path) = &run.results_path {
        println!("Results written to {}", path.display());
    }
}
