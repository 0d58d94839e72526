use serde::Serialize;
use std::collections::HashSet;

use crate::config::SamplerConfig;
use crate::data::{CellValue, RowTable};
use crate::sampler::{
    AmountCoverageReport, SampleOutcome, SampleSelection, SamplingWarning, SelectionOrigin,
};
use crate::types::ColumnName;

/// Distinct-value coverage of one column by a selection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnCoverage {
    /// Measured column.
    pub column: ColumnName,
    /// Distinct non-null values in the table.
    pub distinct_total: usize,
    /// Distinct non-null values present in the selection.
    pub distinct_covered: usize,
    /// `distinct_covered / distinct_total` (1.0 for a column with no values).
    pub share: f64,
}

/// Rows per selection origin.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OriginCounts {
    /// Rows picked by coverage rules.
    pub rule: usize,
    /// High-value rows.
    pub high_value: usize,
    /// Rows added by the amount fill.
    pub amount_fill: usize,
    /// Random padding rows.
    pub padding: usize,
}

/// Serializable digest of a run, written by the command-line runner.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SampleSummary {
    /// Seed of the run, when the engine owned the RNG.
    pub seed: Option<u64>,
    /// Input row count.
    pub input_rows: usize,
    /// Output row count.
    pub sample_rows: usize,
    /// Row-count target.
    pub target_size: usize,
    /// `sample_rows` as a percentage of `input_rows`.
    pub percentage_of_input: f64,
    /// Rows above the target after rule evaluation (base variant).
    pub overage: Option<usize>,
    /// Rows per selection origin.
    pub origins: OriginCounts,
    /// Coverage of each categorical rule column present in the table.
    pub coverage: Vec<ColumnCoverage>,
    /// Amount figures, when amount coverage ran.
    pub amount: Option<AmountCoverageReport>,
    /// Warnings raised during the run.
    pub warnings: Vec<SamplingWarning>,
}

impl SampleSummary {
    /// Summarize `outcome`, measuring coverage for every rule column present in `table`.
    pub fn from_outcome(table: &RowTable, config: &SamplerConfig, outcome: &SampleOutcome) -> Self {
        let coverage = config
            .rules
            .iter()
            .filter(|(_, method)| method.is_categorical())
            .filter_map(|(column, _)| column_coverage(table, &outcome.selection, column))
            .collect();
        Self {
            seed: outcome.seed,
            input_rows: outcome.input_rows,
            sample_rows: outcome.len(),
            target_size: outcome.target_size,
            percentage_of_input: outcome.percentage_of_input(),
            overage: outcome.overage,
            origins: origin_counts(&outcome.selection),
            coverage,
            amount: outcome.amount.clone(),
            warnings: outcome.warnings.clone(),
        }
    }
}

/// Count selected rows per origin.
pub fn origin_counts(selection: &SampleSelection) -> OriginCounts {
    let mut counts = OriginCounts::default();
    for (_, origin) in selection.iter() {
        match origin {
            SelectionOrigin::Rule { .. } => counts.rule += 1,
            SelectionOrigin::HighValue => counts.high_value += 1,
            SelectionOrigin::AmountFill => counts.amount_fill += 1,
            SelectionOrigin::Padding => counts.padding += 1,
        }
    }
    counts
}

/// Distinct-value coverage of `column`; `None` when the table lacks it.
pub fn column_coverage(
    table: &RowTable,
    selection: &SampleSelection,
    column: &str,
) -> Option<ColumnCoverage> {
    let position = table.column_position(column)?;
    let distinct_total = table.group_by_value(position).len();
    let covered: HashSet<_> = selection
        .iter()
        .filter_map(|(index, _)| table.cell(index, position).and_then(CellValue::key))
        .collect();
    let share = if distinct_total == 0 {
        1.0
    } else {
        covered.len() as f64 / distinct_total as f64
    };
    Some(ColumnCoverage {
        column: column.to_string(),
        distinct_total,
        distinct_covered: covered.len(),
        share,
    })
}

/// Sum of absolute amounts in `column` over the selection and the whole table.
pub fn amount_totals(
    table: &RowTable,
    selection: &SampleSelection,
    column: &str,
) -> Option<(f64, f64)> {
    let position = table.column_position(column)?;
    let magnitude = |index| {
        table
            .cell(index, position)
            .and_then(CellValue::magnitude)
            .unwrap_or(0.0)
    };
    let total: f64 = (0..table.len()).map(magnitude).sum();
    let sampled: f64 = selection.iter().map(|(index, _)| magnitude(index)).sum();
    Some((sampled, total))
}
