// assay-core/src/ports/store.rs

// Contracts for loading and saving the inputs of a validation pass.
// The engine never touches storage itself: adapters produce the rule set and
// the dataset snapshot, then hand them over.

use async_trait::async_trait;
use std::path::Path;

use crate::domain::data::DataTables;
use crate::domain::rules::DataQualityRule;
use crate::error::AssayError;

/// A rule document that could not be accepted, with the reason.
/// The descriptive fields are read from the raw document on a best-effort
/// basis, so a broken rule can still be reported against its table.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRule {
    /// Position of the document in its file.
    pub index: usize,
    /// Id, when the document got far enough to have one.
    pub id: Option<String>,
    pub name: Option<String>,
    pub table: Option<String>,
    pub column: Option<String>,
    /// False only when the document explicitly says `enabled: false`.
    pub enabled: bool,
    pub reason: String,
}

/// Outcome of loading a rule file. One bad document never rejects its
/// siblings.
#[derive(Debug, Clone, Default)]
pub struct LoadedRules {
    pub rules: Vec<DataQualityRule>,
    pub rejected: Vec<RejectedRule>,
}

#[async_trait]
pub trait RuleRepository: Send + Sync {
    async fn load_rules(&self, path: &Path) -> Result<LoadedRules, AssayError>;

    async fn save_rules(&self, path: &Path, rules: &[DataQualityRule]) -> Result<(), AssayError>;
}

#[async_trait]
pub trait DatasetSource: Send + Sync {
    async fn load_tables(&self, dir: &Path) -> Result<DataTables, AssayError>;
}
