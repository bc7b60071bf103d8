// assay-core/src/application/project.rs

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::application::report::PassSummary;
use crate::application::validation::{evaluate, evaluate_parallel};
use crate::domain::data::DataTables;
use crate::domain::result::{ResultSeverity, ValidationResult};
use crate::domain::rules::DataQualityRule;
use crate::error::AssayError;
use crate::infrastructure::config::{ProjectConfig, load_project_config};
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::fs::atomic_write;
use crate::ports::store::{DatasetSource, RejectedRule, RuleRepository};

pub const RESULTS_FILE: &str = "run_results.json";

/// Everything a pass needs, read from a project directory.
#[derive(Debug, Clone)]
pub struct LoadedProject {
    pub project_dir: PathBuf,
    pub config: ProjectConfig,
    pub rules: Vec<DataQualityRule>,
    pub rejected: Vec<RejectedRule>,
    pub tables: DataTables,
}

/// Output of one project run, as written to `target/run_results.json`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRun {
    pub project: String,
    pub success: bool,
    pub summary: PassSummary,
    pub results: Vec<ValidationResult>,
    #[serde(skip)]
    pub results_path: Option<PathBuf>,
}

#[instrument(skip(rules, datasets))]
pub async fn load_project<R, D>(
    project_dir: &Path,
    rules: &R,
    datasets: &D,
) -> Result<LoadedProject, AssayError>
where
    R: RuleRepository,
    D: DatasetSource,
{
    let config = load_project_config(project_dir)?;

    let rules_file = config.rules_file(project_dir);
    let data_dir = config.data_dir(project_dir);
    let (loaded, tables) = futures::try_join!(
        rules.load_rules(&rules_file),
        datasets.load_tables(&data_dir)
    )?;

    for rejected in &loaded.rejected {
        warn!(
            index = rejected.index,
            id = ?rejected.id,
            reason = %rejected.reason,
            "Rule document skipped"
        );
    }

    Ok(LoadedProject {
        project_dir: project_dir.to_path_buf(),
        config,
        rules: loaded.rules,
        rejected: loaded.rejected,
        tables,
    })
}

/// Evaluates a loaded project. With `write_results`, the run is also written
/// to the project's target directory.
#[instrument(skip(project), fields(project = %project.config.name))]
pub fn run_project(project: &LoadedProject, write_results: bool) -> Result<ProjectRun, AssayError> {
    let start = Instant::now();

    let evaluated = if project.config.parallel {
        evaluate_parallel(&project.rules, &project.tables)
    } else {
        evaluate(&project.rules, &project.tables)
    };
    let results = merge_rejected(project, evaluated);
    let summary = PassSummary::from_results(&results);

    let mut run = ProjectRun {
        project: project.config.name.clone(),
        success: summary.is_success(project.config.fail_on_warning),
        summary,
        results,
        results_path: None,
    };

    if write_results {
        let path = project
            .config
            .target_dir(&project.project_dir)
            .join(RESULTS_FILE);
        let json = serde_json::to_string_pretty(&run).map_err(InfrastructureError::JsonError)?;
        atomic_write(&path, json)?;
        run.results_path = Some(path);
    }

    info!(
        passed = run.summary.passed,
        failed = run.summary.failed,
        warnings = run.summary.warnings,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Project run finished"
    );
    Ok(run)
}

/// Rejected documents that would have run count as rule-level failures,
/// placed where the document sits in the rule file.
fn merge_rejected(project: &LoadedProject, evaluated: Vec<ValidationResult>) -> Vec<ValidationResult> {
    let failures: Vec<(usize, ValidationResult)> = project
        .rejected
        .iter()
        .filter(|r| r.enabled)
        .map(|r| (r.index, rejected_result(r)))
        .collect();
    if failures.is_empty() {
        return evaluated;
    }

    // Accepted rule k came from the k-th document that was not rejected.
    let skipped: HashSet<usize> = project.rejected.iter().map(|r| r.index).collect();
    let positions: HashMap<&str, usize> = (0..)
        .filter(|i| !skipped.contains(i))
        .zip(&project.rules)
        .map(|(i, rule)| (rule.id.as_str(), i))
        .collect();

    let mut ordered: Vec<(usize, ValidationResult)> = evaluated
        .into_iter()
        .map(|result| {
            let position = positions
                .get(result.rule_id.as_str())
                .copied()
                .unwrap_or(usize::MAX);
            (position, result)
        })
        .collect();
    ordered.extend(failures);
    ordered.sort_by_key(|(position, _)| *position);
    ordered.into_iter().map(|(_, result)| result).collect()
}

fn rejected_result(rejected: &RejectedRule) -> ValidationResult {
    ValidationResult {
        table: rejected.table.clone().unwrap_or_default(),
        rule_id: rejected
            .id
            .clone()
            .unwrap_or_else(|| format!("#{}", rejected.index)),
        rule_name: rejected.name.clone().unwrap_or_default(),
        column: rejected.column.clone().unwrap_or_default(),
        row_index: None,
        group: None,
        severity: ResultSeverity::Failure,
        message: format!("rule could not be loaded: {}", rejected.reason),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::infrastructure::store::{FileRuleRepository, JsonDatasetSource};
    use anyhow::Result;
    use std::fs;
    use tempfile::tempdir;

    fn write_project(dir: &Path, extra_config: &str) -> Result<()> {
        fs::write(
            dir.join("assay.yaml"),
            format!("name: shop\n{}", extra_config),
        )?;
        fs::write(
            dir.join("rules.yaml"),
            r#"
- id: qty-positive
  name: Quantity is positive
  table: orders
  column: qty
  ruleType: range
  parameters: { min: 1 }
- id: note
  name: Note present
  table: orders
  column: note
  ruleType: required
  severity: warning
- id: no-type
  name: Missing type
  table: orders
"#,
        )?;
        fs::create_dir(dir.join("data"))?;
        fs::write(
            dir.join("data").join("orders.json"),
            r#"[{"qty": 2, "note": "gift"}, {"qty": 0, "note": ""}]"#,
        )?;
        Ok(())
    }

    #[tokio::test]
    async fn test_load_and_run_project() -> Result<()> {
        let dir = tempdir()?;
        write_project(dir.path(), "")?;

        let project = load_project(
            dir.path(),
            &FileRuleRepository::new(),
            &JsonDatasetSource::new(),
        )
        .await?;
        assert_eq!(project.rules.len(), 2);
        assert_eq!(project.rejected.len(), 1);
        assert_eq!(project.rejected[0].id.as_deref(), Some("no-type"));

        let run = run_project(&project, true)?;
        assert_eq!(
            (run.summary.passed, run.summary.failed, run.summary.warnings),
            (2, 2, 1)
        );
        assert!(!run.success);

        let written = fs::read_to_string(dir.path().join("target").join(RESULTS_FILE))?;
        let json: serde_json::Value = serde_json::from_str(&written)?;
        assert_eq!(json["project"], "shop");
        assert_eq!(json["results"].as_array().unwrap().len(), 5);
        assert_eq!(json["results"][2]["ruleId"], "note");
        assert_eq!(json["results"][4]["ruleId"], "no-type");
        assert_eq!(json["results"][4]["rowIndex"], serde_json::Value::Null);
        Ok(())
    }

    #[tokio::test]
    async fn test_rule_with_mistyped_parameters_fails_the_run() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("assay.yaml"), "name: shop\n")?;
        fs::write(
            dir.path().join("rules.yaml"),
            r#"
- id: qty-range
  name: Quantity in range
  table: orders
  column: qty
  ruleType: range
  parameters: { min: [1] }
- id: qty-present
  name: Quantity present
  table: orders
  column: qty
  ruleType: required
- id: parked
  name: Parked rule
  table: orders
  ruleType: teleport
  enabled: false
"#,
        )?;
        fs::create_dir(dir.path().join("data"))?;
        fs::write(
            dir.path().join("data").join("orders.json"),
            r#"[{"qty": 2}, {"qty": 5}]"#,
        )?;

        let project = load_project(
            dir.path(),
            &FileRuleRepository::new(),
            &JsonDatasetSource::new(),
        )
        .await?;
        assert_eq!(project.rules.len(), 1);
        assert_eq!(project.rejected.len(), 2);

        let run = run_project(&project, false)?;
        assert!(!run.success);
        assert_eq!(
            (run.summary.passed, run.summary.failed, run.summary.warnings),
            (2, 1, 0)
        );

        // The broken rule reports first, as declared; the disabled one stays silent.
        let broken = &run.results[0];
        assert_eq!(broken.rule_id, "qty-range");
        assert_eq!(broken.rule_name, "Quantity in range");
        assert_eq!(broken.table, "orders");
        assert_eq!(broken.column, "qty");
        assert_eq!(broken.row_index, None);
        assert_eq!(broken.severity, ResultSeverity::Failure);
        assert!(broken.message.starts_with("rule could not be loaded: "));
        assert!(broken.message.contains("qty-range"));
        assert_eq!(run.results.len(), 3);
        assert!(run.results.iter().all(|r| r.rule_id != "parked"));
        Ok(())
    }

    #[tokio::test]
    async fn test_parallel_config_gives_same_results() -> Result<()> {
        let sequential = tempdir()?;
        let parallel = tempdir()?;
        write_project(sequential.path(), "")?;
        write_project(parallel.path(), "parallel: true\ntarget-path: out\n")?;

        let repo = FileRuleRepository::new();
        let source = JsonDatasetSource::new();
        let a = run_project(&load_project(sequential.path(), &repo, &source).await?, false)?;
        let b = run_project(&load_project(parallel.path(), &repo, &source).await?, true)?;

        assert_eq!(a.results, b.results);
        assert!(a.results_path.is_none());
        assert_eq!(
            b.results_path,
            Some(parallel.path().join("out").join(RESULTS_FILE))
        );
        Ok(())
    }
}
