// assay-core/src/lib.rs

#![allow(missing_docs)]
// Memory safety
#![deny(unsafe_code)]
// Robustness
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
// Performance
#![warn(clippy::perf)]

// --- HEXAGONAL MODULES ---

// 1. Ports (contracts)
// Rule repository and dataset source traits.
pub mod ports;

// 2. Domain (engine)
// Values, expressions, aggregations, condition chains, rule dispatch.
// Depends on nothing else in the crate.
pub mod domain;

// 3. Infrastructure (adapters)
// Project config, rule files, JSON datasets, atomic writes.
// Depends on the domain and the ports.
pub mod infrastructure;

// 4. Application (use cases)
// Validation pass, linting, summaries, project runs.
pub mod application;

// --- ERRORS ---
pub mod error;

// --- RE-EXPORTS (FACADE) ---
pub use error::AssayError;
