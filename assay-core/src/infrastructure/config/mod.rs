// assay-core/src/infrastructure/config/mod.rs

pub mod project;

pub use project::{ProjectConfig, load_project_config};
