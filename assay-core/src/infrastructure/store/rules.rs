// assay-core/src/infrastructure/store/rules.rs

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use crate::domain::rules::DataQualityRule;
use crate::error::AssayError;
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::fs::atomic_write;
use crate::ports::store::{LoadedRules, RejectedRule, RuleRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    /// `.json` files are JSON, everything else is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Rule documents stored as a YAML or JSON file. The file holds either a
/// list of rules or a mapping with a `rules` list.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileRuleRepository;

impl FileRuleRepository {
    pub fn new() -> Self {
        Self
    }

    /// Splits file content into raw documents, one per rule.
    pub fn parse_documents(
        content: &str,
        format: DocumentFormat,
    ) -> Result<Vec<serde_json::Value>, InfrastructureError> {
        let root: serde_json::Value = match format {
            DocumentFormat::Json => serde_json::from_str(content)?,
            DocumentFormat::Yaml => {
                let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;
                serde_json::to_value(yaml)?
            }
        };

        match root {
            serde_json::Value::Null => Ok(Vec::new()),
            serde_json::Value::Array(docs) => Ok(docs),
            serde_json::Value::Object(mut map) => match map.remove("rules") {
                Some(serde_json::Value::Array(docs)) => Ok(docs),
                Some(serde_json::Value::Null) | None if map.is_empty() => Ok(Vec::new()),
                _ => Err(InfrastructureError::ConfigError(
                    "expected a `rules` list at the top of the rule file".to_string(),
                )),
            },
            other => Err(InfrastructureError::ConfigError(format!(
                "expected a list of rules, found {}",
                json_kind(&other)
            ))),
        }
    }

    /// Turns raw documents into rules. Each document is judged on its own;
    /// a repeated id is rejected and the first occurrence kept.
    pub fn accept_documents(docs: Vec<serde_json::Value>) -> LoadedRules {
        let mut loaded = LoadedRules::default();
        let mut seen = HashSet::new();

        for (index, doc) in docs.into_iter().enumerate() {
            let text = |key: &str| doc.get(key).and_then(|v| v.as_str()).map(str::to_string);
            let id = text("id");
            let (name, table, column) = (text("name"), text("table"), text("column"));
            let enabled = doc.get("enabled").and_then(|v| v.as_bool()).unwrap_or(true);
            let mut reject = |reason: String| {
                warn!(index, id = ?id, %reason, "Rejecting rule document");
                loaded.rejected.push(RejectedRule {
                    index,
                    id: id.clone(),
                    name: name.clone(),
                    table: table.clone(),
                    column: column.clone(),
                    enabled,
                    reason,
                });
            };

            let rule: DataQualityRule = match serde_json::from_value(doc) {
                Ok(rule) => rule,
                Err(e) => {
                    reject(e.to_string());
                    continue;
                }
            };
            if let Err(e) = rule.validate() {
                reject(e.to_string());
                continue;
            }
            if !seen.insert(rule.id.clone()) {
                reject(format!("duplicate rule id '{}'", rule.id));
                continue;
            }

            debug!(rule = %rule.id, rule_type = %rule.rule_type(), "Accepted rule");
            loaded.rules.push(rule);
        }

        loaded
    }

    pub fn render(
        rules: &[DataQualityRule],
        format: DocumentFormat,
    ) -> Result<String, InfrastructureError> {
        Ok(match format {
            DocumentFormat::Json => serde_json::to_string_pretty(rules)?,
            DocumentFormat::Yaml => serde_yaml::to_string(rules)?,
        })
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a list",
        serde_json::Value::Object(_) => "a mapping",
    }
}

#[async_trait]
impl RuleRepository for FileRuleRepository {
    #[instrument(skip(self))]
    async fn load_rules(&self, path: &Path) -> Result<LoadedRules, AssayError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(InfrastructureError::Io)?;
        let docs = Self::parse_documents(&content, DocumentFormat::from_path(path))?;
        let loaded = Self::accept_documents(docs);
        info!(
            accepted = loaded.rules.len(),
            rejected = loaded.rejected.len(),
            "Rules loaded"
        );
        Ok(loaded)
    }

    #[instrument(skip(self, rules), fields(rules = rules.len()))]
    async fn save_rules(&self, path: &Path, rules: &[DataQualityRule]) -> Result<(), AssayError> {
        let content = Self::render(rules, DocumentFormat::from_path(path))?;
        atomic_write(path, content)?;
        info!("Rules saved");
        Ok(())
    }
}
