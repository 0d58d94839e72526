#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Reusable command-line runners shared by the bundled binary.
pub mod apps;
/// Sampling configuration types.
pub mod config;
/// Centralized constants used across the engine, transports, and runners.
pub mod constants;
/// Row table and cell types.
pub mod data;
/// Size arithmetic and report formatting helpers.
pub mod heuristics;
/// Coverage measurements and run summaries.
pub mod metrics;
/// The sampling engine.
pub mod sampler;
/// Table transports (CSV today).
pub mod transport;
/// Shared type aliases.
pub mod types;

mod errors;

pub use config::{AmountCoverage, CoverageMethod, CoverageRules, SamplerConfig};
pub use data::{CellValue, RowTable, ValueKey};
pub use errors::SamplerError;
pub use metrics::{ColumnCoverage, SampleSummary};
pub use sampler::{
    AmountCoverageReport, AuditSampler, SampleOutcome, SampleSelection, SamplingWarning,
    SelectionOrigin,
};
pub use types::{ColumnName, RowIndex};
