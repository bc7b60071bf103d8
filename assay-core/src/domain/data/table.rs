// assay-core/src/domain/data/table.rs

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::value::Value;

/// One row: column name -> value, in column declaration order.
pub type DataRecord = IndexMap<String, Value>;

/// All tables of a dataset snapshot, by table name.
pub type DataTables = BTreeMap<String, DataTable>;

/// A row whose key set differs from the first record of its table.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeViolation {
    pub row_index: usize,
    pub missing: Vec<String>,
    pub unexpected: Vec<String>,
}

/// Ordered rows sharing (in principle) the column set of the first record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataTable {
    records: Vec<DataRecord>,
}

impl DataTable {
    pub fn new(records: Vec<DataRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[DataRecord] {
        &self.records
    }

    pub fn record(&self, index: usize) -> Option<&DataRecord> {
        self.records.get(index)
    }

    /// Declared columns, i.e. the keys of the first record.
    pub fn columns(&self) -> Vec<&str> {
        self.records
            .first()
            .map(|r| r.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.records
            .first()
            .is_some_and(|r| r.contains_key(column))
    }

    /// Values of `column`, one per row. Rows lacking the key yield `None`.
    pub fn column_values<'a>(
        &'a self,
        column: &'a str,
    ) -> impl Iterator<Item = Option<&'a Value>> + 'a {
        self.records.iter().map(move |r| r.get(column))
    }

    /// Rows whose key set deviates from the first record.
    pub fn shape_violations(&self) -> Vec<ShapeViolation> {
        let Some(first) = self.records.first() else {
            return vec![];
        };

        self.records
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(row_index, record)| {
                let missing: Vec<String> = first
                    .keys()
                    .filter(|k| !record.contains_key(*k))
                    .cloned()
                    .collect();
                let unexpected: Vec<String> = record
                    .keys()
                    .filter(|k| !first.contains_key(*k))
                    .cloned()
                    .collect();

                if missing.is_empty() && unexpected.is_empty() {
                    None
                } else {
                    Some(ShapeViolation {
                        row_index,
                        missing,
                        unexpected,
                    })
                }
            })
            .collect()
    }
}

impl From<Vec<DataRecord>> for DataTable {
    fn from(records: Vec<DataRecord>) -> Self {
        Self::new(records)
    }
}

impl FromIterator<DataRecord> for DataTable {
    fn from_iter<I: IntoIterator<Item = DataRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Builds a record from `(column, value)` pairs, keeping their order.
pub fn record<K, V, I>(pairs: I) -> DataRecord
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
