// assay-core/src/infrastructure/store/datasets.rs

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::domain::data::{DataRecord, DataTable, DataTables, Value};
use crate::error::AssayError;
use crate::infrastructure::error::InfrastructureError;
use crate::ports::store::DatasetSource;

const DEFAULT_CONCURRENCY: usize = 8;

/// A directory of `*.json` files, one table per file, named after the file
/// stem. Each file holds an array of flat objects.
#[derive(Debug, Clone, Copy)]
pub struct JsonDatasetSource {
    concurrency: usize,
}

impl Default for JsonDatasetSource {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl JsonDatasetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Parses the content of one dataset file. `origin` only feeds error
    /// messages.
    pub fn parse_table(content: &str, origin: &str) -> Result<DataTable, InfrastructureError> {
        let rows: Vec<IndexMap<String, serde_json::Value>> = serde_json::from_str(content)
            .map_err(|e| InfrastructureError::InvalidDataset {
                path: origin.to_string(),
                reason: e.to_string(),
            })?;

        Ok(rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(column, value)| (column, Value::from_json(&value)))
                    .collect::<DataRecord>()
            })
            .collect())
    }
}

fn discover(dir: &Path) -> Result<Vec<(String, PathBuf)>, InfrastructureError> {
    if !dir.is_dir() {
        return Err(InfrastructureError::InvalidDataset {
            path: dir.display().to_string(),
            reason: "not a directory".to_string(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| InfrastructureError::InvalidDataset {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        let path = entry.path();
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if !entry.file_type().is_file() || !is_json {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            files.push((stem.to_string(), path.to_path_buf()));
        }
    }
    Ok(files)
}

#[async_trait]
impl DatasetSource for JsonDatasetSource {
    #[instrument(skip(self))]
    async fn load_tables(&self, dir: &Path) -> Result<DataTables, AssayError> {
        let files = discover(dir)?;

        let tables: Vec<(String, DataTable)> = stream::iter(files)
            .map(|(name, path)| async move {
                let content = tokio::fs::read_to_string(&path).await?;
                let table = Self::parse_table(&content, &path.display().to_string())?;
                debug!(table = %name, rows = table.len(), "Dataset loaded");
                Ok::<_, InfrastructureError>((name, table))
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        let tables: DataTables = tables.into_iter().collect();
        info!(tables = tables.len(), "Snapshot loaded");
        Ok(tables)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_keeps_column_order_and_nesting() -> Result<()> {
        let table = JsonDatasetSource::parse_table(
            r#"[{"zeta": 1, "alpha": "x", "tags": ["a", "b"], "gone": null}]"#,
            "inline",
        )?;
        assert_eq!(table.columns(), vec!["zeta", "alpha", "tags", "gone"]);
        let row = table.record(0).unwrap();
        assert_eq!(row["zeta"], Value::Number(1.0));
        assert_eq!(row["tags"], Value::String(r#"["a","b"]"#.into()));
        assert_eq!(row["gone"], Value::Null);
        Ok(())
    }

    #[test]
    fn test_rejects_non_array_files() {
        let err = JsonDatasetSource::parse_table(r#"{"a": 1}"#, "orders.json").unwrap_err();
        match err {
            InfrastructureError::InvalidDataset { path, .. } => assert_eq!(path, "orders.json"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(JsonDatasetSource::parse_table("[1, 2]", "x.json").is_err());
    }

    #[tokio::test]
    async fn test_loads_every_json_file_as_a_table() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("orders.json"), r#"[{"id": 1}, {"id": 2}]"#)?;
        fs::write(dir.path().join("customers.json"), "[]")?;
        fs::write(dir.path().join("notes.txt"), "ignored")?;
        fs::create_dir(dir.path().join("archive.json"))?;

        let tables = JsonDatasetSource::new()
            .with_concurrency(2)
            .load_tables(dir.path())
            .await?;

        assert_eq!(tables.keys().collect::<Vec<_>>(), vec!["customers", "orders"]);
        assert_eq!(tables["orders"].len(), 2);
        assert!(tables["customers"].is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = tempdir().unwrap();
        let err = JsonDatasetSource::new()
            .load_tables(&dir.path().join("nope"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AssayError::Infrastructure(InfrastructureError::InvalidDataset { .. })
        ));
    }
}
