// assay/tests/cli_tests.rs

use anyhow::{Context, Result};
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// A private copy of the demo project, so runs can write `target/` freely.
struct AssayTestEnv {
    _tmp: TempDir,
    root: PathBuf,
}

impl AssayTestEnv {
    fn new() -> Result<Self> {
        let tmp = tempfile::tempdir()?;
        let project_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .context("Workspace root not found")?
            .join("demos/orders");

        let dest = tmp.path().join("orders");
        Self::copy_dir(&project_root, &dest)?;

        Ok(Self {
            _tmp: tmp,
            root: dest,
        })
    }

    fn copy_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
        let mut options = fs_extra::dir::CopyOptions::new();
        options.skip_exist = true;
        options.content_only = true;

        fs::create_dir_all(dst)?;
        fs_extra::dir::copy(src, dst, &options)
            .map(|_| ())
            .map_err(|e| std::io::Error::other(e.to_string()))
    }

    fn assay(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("assay"));
        cmd.current_dir(&self.root);
        for var in [
            "ASSAY_RULES_PATH",
            "ASSAY_DATA_PATH",
            "ASSAY_TARGET_PATH",
            "ASSAY_PARALLEL",
            "RUST_LOG",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }

    fn append_rules(&self, yaml: &str) -> Result<()> {
        let path = self.root.join("rules.yaml");
        let mut rules = fs::read_to_string(&path)?;
        rules.push_str(yaml);
        fs::write(path, rules)?;
        Ok(())
    }
}

fn stdout_json(output: &std::process::Output) -> Result<serde_json::Value> {
    Ok(serde_json::from_slice(&output.stdout)?)
}

#[test]
fn test_run_reports_failures_and_exits_non_zero() -> Result<()> {
    let env = AssayTestEnv::new()?;

    let output = env.assay().args(["run", "--format", "json"]).output()?;
    assert_eq!(output.status.code(), Some(1));

    let run = stdout_json(&output)?;
    assert_eq!(run["project"], "orders");
    assert_eq!(run["success"], false);
    assert_eq!(run["summary"]["passed"], 24);
    assert_eq!(run["summary"]["failed"], 3);
    assert_eq!(run["summary"]["warnings"], 3);
    assert_eq!(run["results"].as_array().context("results")?.len(), 30);

    let failures: Vec<(String, u64)> = run["results"]
        .as_array()
        .context("results")?
        .iter()
        .filter(|r| r["severity"] == "failure")
        .map(|r| {
            (
                r["ruleId"].as_str().unwrap_or_default().to_string(),
                r["rowIndex"].as_u64().unwrap_or(u64::MAX),
            )
        })
        .collect();
    assert_eq!(
        failures,
        vec![
            ("qty-positive".to_string(), 2),
            ("customer-exists".to_string(), 2),
            ("ship-after-order".to_string(), 1),
        ]
    );

    let qty = run["results"]
        .as_array()
        .context("results")?
        .iter()
        .find(|r| r["ruleId"] == "qty-positive" && r["severity"] == "failure")
        .context("qty failure")?;
    insta::assert_snapshot!(qty["message"].as_str().unwrap_or_default(), @"0 is outside [1, ..] [order_id=3]");

    // The run is also persisted under the target directory.
    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(env.root.join("target/run_results.json"))?)?;
    assert_eq!(written["summary"], run["summary"]);
    Ok(())
}

#[test]
fn test_run_table_output() -> Result<()> {
    let env = AssayTestEnv::new()?;

    env.assay()
        .args(["run", "--failures-only"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Project: orders (v1.0.0)"))
        .stdout(predicate::str::contains("FAIL: 24 passed, 3 failed, 3 warnings"))
        .stdout(predicate::str::contains("'bob@example' does not match"));
    Ok(())
}

#[test]
fn test_parallel_run_matches_sequential_run() -> Result<()> {
    let env = AssayTestEnv::new()?;

    let sequential = stdout_json(&env.assay().args(["run", "--format", "json"]).output()?)?;
    let parallel = stdout_json(
        &env.assay()
            .args(["run", "--format", "json", "--parallel", "-o", "out/parallel.json"])
            .output()?,
    )?;
    assert_eq!(sequential["results"], parallel["results"]);
    assert!(env.root.join("out/parallel.json").exists());
    Ok(())
}

#[test]
fn test_run_passes_once_the_data_is_fixed() -> Result<()> {
    let env = AssayTestEnv::new()?;
    fs::write(
        env.root.join("rules.yaml"),
        r#"
- id: order-id-unique
  name: Order ids are unique
  table: orders
  column: order_id
  ruleType: unique
- id: tier-enum
  name: Customer tier is known
  table: customers
  column: tier
  ruleType: enum
  parameters:
    allowedValues: [gold, silver, bronze]
    caseSensitive: false
"#,
    )?;

    env.assay()
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("PASS: 8 passed, 0 failed, 0 warnings"));
    Ok(())
}

#[test]
fn test_broken_rules_do_not_abort_the_run() -> Result<()> {
    let env = AssayTestEnv::new()?;
    env.append_rules(
        r#"
- id: ghost-table
  name: Points at a table that does not exist
  table: invoices
  column: total
  ruleType: required
- id: no-type
  name: Missing its rule type
  table: orders
"#,
    )?;

    let output = env.assay().args(["run", "--format", "json"]).output()?;
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr.clone())?;
    assert!(stderr.contains("skipped rule document #8 (no-type)"), "{}", stderr);

    let run = stdout_json(&output)?;
    let ghost: Vec<&serde_json::Value> = run["results"]
        .as_array()
        .context("results")?
        .iter()
        .filter(|r| r["ruleId"] == "ghost-table")
        .collect();
    assert_eq!(ghost.len(), 1);
    assert_eq!(ghost[0]["rowIndex"], serde_json::Value::Null);
    assert_eq!(ghost[0]["severity"], "failure");

    let unloaded = run["results"]
        .as_array()
        .context("results")?
        .iter()
        .find(|r| r["ruleId"] == "no-type")
        .context("no-type result")?;
    assert_eq!(unloaded["severity"], "failure");
    assert_eq!(unloaded["table"], "orders");
    assert!(
        unloaded["message"]
            .as_str()
            .is_some_and(|m| m.starts_with("rule could not be loaded"))
    );
    Ok(())
}

#[test]
fn test_check_clean_project() -> Result<()> {
    let env = AssayTestEnv::new()?;

    let output = env.assay().arg("check").output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    insta::assert_snapshot!(stdout.trim_end(), @"7 rule(s) checked: 0 error(s), 0 warning(s)");
    Ok(())
}

#[test]
fn test_check_reports_definition_errors() -> Result<()> {
    let env = AssayTestEnv::new()?;
    env.append_rules(
        r#"
- id: bad-pattern
  name: Broken regex
  table: customers
  column: name
  ruleType: regex
  parameters:
    pattern: "[A-Z"
- id: order-id-unique
  name: Duplicate id
  table: orders
  column: order_id
  ruleType: not-null
"#,
    )?;

    let output = env.assay().args(["check", "--format", "json"]).output()?;
    assert_eq!(output.status.code(), Some(1));
    let issues = stdout_json(&output)?;
    let messages: Vec<&str> = issues
        .as_array()
        .context("issues")?
        .iter()
        .filter_map(|i| i["message"].as_str())
        .collect();
    assert!(messages.iter().any(|m| m.contains("duplicate rule id 'order-id-unique'")));
    assert!(messages.iter().any(|m| m.contains("invalid pattern")));
    Ok(())
}

#[test]
fn test_inspect_table() -> Result<()> {
    let env = AssayTestEnv::new()?;

    env.assay()
        .args(["inspect", "--table", "customers", "--limit", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Table 'customers': 3 row(s)"))
        .stdout(predicate::str::contains("Columns: [customer_id, name, email, tier]"))
        .stdout(predicate::str::contains("'Ann'"))
        .stdout(predicate::str::contains("'Cy'").not());

    env.assay()
        .args(["inspect", "--table", "invoices"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Known tables: [customers, orders]"));
    Ok(())
}

#[test]
fn test_eval_expression_on_a_row() -> Result<()> {
    let env = AssayTestEnv::new()?;

    let output = env
        .assay()
        .args(["eval", "qty * price", "--table", "orders"])
        .output()?;
    assert!(output.status.success());
    insta::assert_snapshot!(String::from_utf8(output.stdout)?.trim_end(), @"50 (number)");

    let output = env
        .assay()
        .args(["eval", "qty * price >= 20", "-t", "orders", "--row", "4"])
        .output()?;
    insta::assert_snapshot!(String::from_utf8(output.stdout)?.trim_end(), @"false (boolean)");

    env.assay()
        .args(["eval", "qty", "-t", "orders", "--row", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
    Ok(())
}

#[test]
fn test_env_override_and_missing_config() -> Result<()> {
    let env = AssayTestEnv::new()?;

    env.assay()
        .env("ASSAY_DATA_PATH", "nowhere")
        .args(["inspect", "-t", "orders"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load datasets"));

    fs::remove_file(env.root.join("assay.yaml"))?;
    env.assay()
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No configuration file found"));
    Ok(())
}
