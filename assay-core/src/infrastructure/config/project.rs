// assay-core/src/infrastructure/config/project.rs

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use crate::infrastructure::error::InfrastructureError;

const CANDIDATES: [&str; 2] = ["assay.yaml", "assay.yml"];

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(rename = "rules-path", default = "default_rules_path")]
    pub rules_path: String,

    #[serde(rename = "data-path", default = "default_data_path")]
    pub data_path: String,

    #[serde(rename = "target-path", default = "default_target_path")]
    pub target_path: String,

    /// Spread rules over worker threads.
    #[serde(default)]
    pub parallel: bool,

    /// Treat warning results as a failed run.
    #[serde(rename = "fail-on-warning", default)]
    pub fail_on_warning: bool,
}

fn default_version() -> String {
    "0.1.0".to_string()
}
fn default_rules_path() -> String {
    "rules.yaml".to_string()
}
fn default_data_path() -> String {
    "data".to_string()
}
fn default_target_path() -> String {
    "target".to_string()
}

impl ProjectConfig {
    pub fn rules_file(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.rules_path)
    }

    pub fn data_dir(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.data_path)
    }

    pub fn target_dir(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.target_path)
    }
}

// --- LOADER ---

#[instrument(skip(project_dir))]
pub fn load_project_config(project_dir: &Path) -> Result<ProjectConfig, InfrastructureError> {
    let config_path = find_main_config(project_dir)?;
    info!(path = ?config_path, "Loading project config");

    let content = fs::read_to_string(&config_path)?;
    let mut config: ProjectConfig = serde_yaml::from_str(&content)?;

    // Layering: ASSAY_DATA_PATH=/tmp/snapshot assay run
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    Ok(config)
}

fn find_main_config(root: &Path) -> Result<PathBuf, InfrastructureError> {
    for filename in CANDIDATES {
        let p = root.join(filename);
        if p.exists() {
            return Ok(p);
        }
    }
    Err(InfrastructureError::ConfigNotFound(format!(
        "No configuration file found in {:?}. Checked: {:?}",
        root, CANDIDATES
    )))
}

fn apply_env_overrides<F>(config: &mut ProjectConfig, lookup: F) -> Result<(), InfrastructureError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("ASSAY_RULES_PATH") {
        info!(old = ?config.rules_path, new = ?val, "Overriding rules path via ENV");
        config.rules_path = val;
    }
    if let Some(val) = lookup("ASSAY_DATA_PATH") {
        info!(old = ?config.data_path, new = ?val, "Overriding data path via ENV");
        config.data_path = val;
    }
    if let Some(val) = lookup("ASSAY_TARGET_PATH") {
        info!(old = ?config.target_path, new = ?val, "Overriding target path via ENV");
        config.target_path = val;
    }
    if let Some(val) = lookup("ASSAY_PARALLEL") {
        config.parallel = match val.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            other => {
                return Err(InfrastructureError::ConfigError(format!(
                    "ASSAY_PARALLEL must be a boolean, got '{}'",
                    other
                )));
            }
        };
        info!(parallel = config.parallel, "Overriding parallel mode via ENV");
    }
    Ok(())
}
