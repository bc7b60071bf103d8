// assay/src/commands/eval.rs
//
// USE CASE: Evaluate an ad-hoc expression against one row.

use anyhow::{Context, anyhow};
use std::path::PathBuf;

use assay_core::domain::expression::{EvalContext, Expression};

use super::{find_table, load_snapshot};

pub async fn execute(
    project_dir: PathBuf,
    expression: String,
    table_name: String,
    row: usize,
) -> anyhow::Result<()> {
    let (_, tables) = load_snapshot(&project_dir).await?;
    let table = find_table(&tables, &table_name)?;
    let record = table.record(row).ok_or_else(|| {
        anyhow!(
            "Row {} is out of range: table '{}' has {} row(s)",
            row,
            table_name,
            table.len()
        )
    })?;

    let columns = table.columns();
    let parsed = Expression::parse(&expression, &columns)
        .with_context(|| format!("Invalid expression '{}'", expression))?;
    let ctx = EvalContext::new(&table_name, table, record);
    let value = parsed
        .evaluate(&ctx)
        .with_context(|| format!("Cannot evaluate '{}' on row {}", expression, row))?;

    println!("{} ({})", value.describe(), value.type_name());
    Ok(())
}
