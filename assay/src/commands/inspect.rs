// assay/src/commands/inspect.rs
//
// USE CASE: Inspect a dataset table (columns, ragged rows, sample rows).

use std::path::PathBuf;

use super::{find_table, load_snapshot, new_table};

pub async fn execute(project_dir: PathBuf, table_name: String, limit: usize) -> anyhow::Result<()> {
    let (_, tables) = load_snapshot(&project_dir).await?;
    let table = find_table(&tables, &table_name)?;
    let columns = table.columns();

    println!("Table '{}': {} row(s)", table_name, table.len());
    println!("Columns: [{}]", columns.join(", "));

    for violation in table.shape_violations() {
        println!(
            "Row {} differs from the first row: missing [{}], unexpected [{}]",
            violation.row_index,
            violation.missing.join(", "),
            violation.unexpected.join(", ")
        );
    }

    if limit == 0 || table.is_empty() {
        return Ok(());
    }

    let mut header = vec!["#"];
    header.extend(columns.iter().copied());
    let mut sample = new_table(&header);
    for (index, record) in table.records().iter().take(limit).enumerate() {
        let mut row = vec![index.to_string()];
        row.extend(
            columns
                .iter()
                .map(|c| record.get(*c).map(|v| v.describe()).unwrap_or_default()),
        );
        sample.add_row(row);
    }
    println!("{sample}");

    Ok(())
}
