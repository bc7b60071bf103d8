// assay/src/commands/check.rs
//
// USE CASE: Lint rule definitions without evaluating rows.

use anyhow::Context;
use std::path::PathBuf;

use assay_core::application::{LintIssue, LintLevel, lint_rules};
use assay_core::infrastructure::store::FileRuleRepository;
use assay_core::ports::store::RuleRepository;

use super::{load_snapshot, new_table};
use crate::cli::OutputFormat;

pub async fn execute(project_dir: PathBuf, format: OutputFormat) -> anyhow::Result<()> {
    let (config, tables) = load_snapshot(&project_dir).await?;
    let rules_file = config.rules_file(&project_dir);
    let loaded = FileRuleRepository::new()
        .load_rules(&rules_file)
        .await
        .with_context(|| format!("Failed to load rules from {:?}", rules_file))?;

    // Rejected documents never reach the linter, report them first.
    let mut issues: Vec<LintIssue> = loaded
        .rejected
        .iter()
        .map(|r| LintIssue {
            rule_id: r.id.clone().unwrap_or_else(|| format!("#{}", r.index)),
            level: LintLevel::Error,
            message: r.reason.clone(),
        })
        .collect();
    issues.extend(lint_rules(&loaded.rules, &tables));

    let errors = issues.iter().filter(|i| i.level == LintLevel::Error).count();
    let warnings = issues.len() - errors;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&issues)?),
        OutputFormat::Table => {
            if !issues.is_empty() {
                let mut table = new_table(&["Rule", "Level", "Message"]);
                for issue in &issues {
                    table.add_row(vec![
                        issue.rule_id.clone(),
                        issue.level.to_string(),
                        issue.message.clone(),
                    ]);
                }
                println!("{table}");
            }
            println!(
                "{} rule(s) checked: {} error(s), {} warning(s)",
                loaded.rules.len() + loaded.rejected.len(),
                errors,
                warnings
            );
        }
    }

    if errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}
