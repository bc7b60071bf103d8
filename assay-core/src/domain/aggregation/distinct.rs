// assay-core/src/domain/aggregation/distinct.rs

use std::collections::{HashMap, HashSet};

use super::AggregateFunction;
use crate::domain::data::{DataRecord, DataTable, Value};
use crate::domain::error::DomainError;

static NULL: Value = Value::Null;

// Separator between key parts; cannot appear in a match key of a scalar.
const KEY_SEPARATOR: char = '\u{1f}';

/// Rows sharing the same values for the group columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    /// `col=value` pairs, e.g. `category=A, region=North`.
    pub label: String,
    /// Member row indexes, in row order.
    pub rows: Vec<usize>,
}

/// Partition of a table by group columns.
#[derive(Debug, Clone, Default)]
pub struct Grouping {
    groups: Vec<Group>,
    membership: Vec<Option<usize>>,
    ungrouped: HashMap<usize, String>,
}

impl Grouping {
    /// Groups in order of first appearance.
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group_of(&self, row_index: usize) -> Option<&Group> {
        self.membership
            .get(row_index)
            .copied()
            .flatten()
            .and_then(|g| self.groups.get(g))
    }

    pub fn group_index_of(&self, row_index: usize) -> Option<usize> {
        self.membership.get(row_index).copied().flatten()
    }

    /// Why a row has no group, if it has none.
    pub fn ungrouped_reason(&self, row_index: usize) -> Option<&str> {
        self.ungrouped.get(&row_index).map(String::as_str)
    }
}

/// Computes the group key of a record, or the reason it has none.
/// A missing or blank (null or empty) group column leaves the row without a group.
pub fn group_key(
    record: &DataRecord,
    group_columns: &[String],
) -> Result<(String, String), String> {
    let mut key = String::new();
    let mut label = Vec::with_capacity(group_columns.len());

    for column in group_columns {
        match record.get(column) {
            None => return Err(format!("group column '{}' is missing", column)),
            Some(v) if v.is_blank() => {
                return Err(format!("group column '{}' is blank", column));
            }
            Some(v) => {
                key.push_str(&v.match_key());
                key.push(KEY_SEPARATOR);
                label.push(format!("{}={}", column, v));
            }
        }
    }

    Ok((key, label.join(", ")))
}

/// Partitions the rows of `table` by the tuple of `group_columns` values.
/// Without group columns every row lands in a single group.
pub fn partition(table: &DataTable, group_columns: &[String]) -> Grouping {
    let mut grouping = Grouping {
        membership: vec![None; table.len()],
        ..Default::default()
    };
    let mut index: HashMap<String, usize> = HashMap::new();

    for (row_index, record) in table.records().iter().enumerate() {
        match group_key(record, group_columns) {
            Ok((key, label)) => {
                let next = grouping.groups.len();
                let g = *index.entry(key).or_insert(next);
                if g == next {
                    grouping.groups.push(Group {
                        label,
                        rows: Vec::new(),
                    });
                }
                grouping.groups[g].rows.push(row_index);
                grouping.membership[row_index] = Some(g);
            }
            Err(reason) => {
                grouping.ungrouped.insert(row_index, reason);
            }
        }
    }

    grouping
}

/// Rows whose group key equals the one of `record`, in row order.
pub fn rows_matching(
    table: &DataTable,
    record: &DataRecord,
    group_columns: &[String],
) -> Result<Vec<usize>, String> {
    let (key, _) = group_key(record, group_columns)?;
    Ok(table
        .records()
        .iter()
        .enumerate()
        .filter(|(_, r)| group_key(r, group_columns).is_ok_and(|(k, _)| k == key))
        .map(|(i, _)| i)
        .collect())
}

/// Keeps the first row (by row order) for every distinct value of
/// `distinct_column`.
pub fn representatives(table: &DataTable, rows: &[usize], distinct_column: &str) -> Vec<usize> {
    let mut seen = HashSet::new();
    rows.iter()
        .copied()
        .filter(|&i| {
            let value = table
                .record(i)
                .and_then(|r| r.get(distinct_column))
                .unwrap_or(&NULL);
            seen.insert(value.match_key())
        })
        .collect()
}

/// Applies `function` to `column` over the distinct representatives of `rows`.
pub fn aggregate_distinct(
    table: &DataTable,
    rows: &[usize],
    function: AggregateFunction,
    column: &str,
    distinct_column: &str,
) -> Result<Value, DomainError> {
    let reps = representatives(table, rows, distinct_column);
    function.apply(reps.iter().map(|&i| {
        table
            .record(i)
            .and_then(|r| r.get(column))
            .unwrap_or(&NULL)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::data::record;
    use anyhow::Result;

    fn sales() -> DataTable {
        DataTable::new(vec![
            record([("category", "A"), ("region", "North"), ("amount", "100")]),
            record([("category", "B"), ("region", "North"), ("amount", "80")]),
            record([("category", "A"), ("region", "South"), ("amount", "150")]),
            record([("category", "A"), ("region", "North"), ("amount", "999")]),
            record([("category", "A"), ("region", "East"), ("amount", "120")]),
        ])
    }

    #[test]
    fn test_partition_keeps_first_seen_order() {
        let grouping = partition(&sales(), &["category".to_string()]);
        let labels: Vec<&str> = grouping.groups().iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["category=A", "category=B"]);
        assert_eq!(grouping.groups()[0].rows, vec![0, 2, 3, 4]);
        assert_eq!(grouping.group_of(1).map(|g| g.label.as_str()), Some("category=B"));
    }

    #[test]
    fn test_distinct_keeps_first_occurrence() -> Result<()> {
        let table = sales();
        let rows = vec![0, 2, 3, 4];
        // Row 3 repeats region North and must not count.
        assert_eq!(representatives(&table, &rows, "region"), vec![0, 2, 4]);
        assert_eq!(
            aggregate_distinct(&table, &rows, AggregateFunction::Sum, "amount", "region")?,
            Value::from(370)
        );
        Ok(())
    }

    #[test]
    fn test_rows_without_group_key() {
        let mut table = sales().records().to_vec();
        table.push(record([("region", "West"), ("amount", "10")]));
        table.push(record([
            ("category", Value::Null),
            ("region", Value::from("West")),
            ("amount", Value::from(5)),
        ]));
        let grouping = partition(&DataTable::new(table), &["category".to_string()]);
        assert!(grouping.group_of(5).is_none());
        assert!(grouping.ungrouped_reason(5).is_some_and(|r| r.contains("missing")));
        assert!(grouping.ungrouped_reason(6).is_some_and(|r| r.contains("is blank")));
        assert_eq!(grouping.ungrouped_reason(0), None);
    }

    #[test]
    fn test_empty_string_forms_no_group() {
        let table = DataTable::new(vec![
            record([("g", ""), ("amount", "1")]),
            record([("g", "A"), ("amount", "2")]),
        ]);
        let grouping = partition(&table, &["g".to_string()]);
        let labels: Vec<&str> = grouping.groups().iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["g=A"]);
        assert!(grouping.group_of(0).is_none());
        assert!(grouping.ungrouped_reason(0).is_some_and(|r| r.contains("'g' is blank")));
        assert!(rows_matching(&table, &table.records()[0], &["g".to_string()]).is_err());
    }

    #[test]
    fn test_no_group_columns_is_one_group() {
        let grouping = partition(&sales(), &[]);
        assert_eq!(grouping.groups().len(), 1);
        assert_eq!(grouping.groups()[0].rows.len(), 5);
    }

    #[test]
    fn test_rows_matching_numeric_strings() -> Result<()> {
        let table = DataTable::new(vec![
            record([("k", Value::from(1))]),
            record([("k", Value::from("1"))]),
            record([("k", Value::from(2))]),
        ]);
        let rows = rows_matching(&table, &table.records()[0], &["k".to_string()])
            .map_err(anyhow::Error::msg)?;
        assert_eq!(rows, vec![0, 1]);
        Ok(())
    }
}
