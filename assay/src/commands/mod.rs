// assay/src/commands/mod.rs

pub mod check;
pub mod eval;
pub mod inspect;
pub mod run;

use anyhow::{Context, bail};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use std::path::Path;

use assay_core::domain::data::{DataTable, DataTables};
use assay_core::infrastructure::config::{ProjectConfig, load_project_config};
use assay_core::infrastructure::store::JsonDatasetSource;
use assay_core::ports::store::DatasetSource;

/// Config and data snapshot of a project, without its rules.
pub(crate) async fn load_snapshot(project_dir: &Path) -> anyhow::Result<(ProjectConfig, DataTables)> {
    let config = load_project_config(project_dir).with_context(|| {
        format!(
            "Failed to load project configuration from {:?}",
            project_dir
        )
    })?;
    let data_dir = config.data_dir(project_dir);
    let tables = JsonDatasetSource::new()
        .load_tables(&data_dir)
        .await
        .with_context(|| format!("Failed to load datasets from {:?}", data_dir))?;
    Ok((config, tables))
}

pub(crate) fn find_table<'a>(tables: &'a DataTables, name: &str) -> anyhow::Result<&'a DataTable> {
    match tables.get(name) {
        Some(table) => Ok(table),
        None => {
            let known: Vec<&str> = tables.keys().map(String::as_str).collect();
            bail!("Table '{}' not found. Known tables: [{}]", name, known.join(", "))
        }
    }
}

pub(crate) fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    table
}
