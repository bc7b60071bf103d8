// assay-core/src/application/mod.rs

pub mod lint;
pub mod project;
pub mod report;
pub mod validation;

// --- RE-EXPORTS (FACADE PATTERN) ---
// Lets the CLI write `use assay_core::application::{evaluate, lint_rules};`
// without knowing the file layout.

pub use lint::{LintIssue, LintLevel, lint_rules};
pub use project::{LoadedProject, ProjectRun, RESULTS_FILE, load_project, run_project};
pub use report::{PassSummary, RuleSummary};
pub use validation::{PassState, ValidationPass, evaluate, evaluate_parallel, evaluate_rule};
