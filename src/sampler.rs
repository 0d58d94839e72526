use indexmap::IndexMap;
use rand::seq::{IndexedRandom, index};
use rand::{Rng, RngCore};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::{AmountCoverage, CoverageMethod, SamplerConfig};
use crate::data::{CellValue, RowTable, ValueKey};
use crate::errors::SamplerError;
use crate::heuristics::{most_values_count, percentage, random_fraction_count, target_size};
use crate::types::{ColumnName, RowIndex};

#[derive(Debug, Clone)]
/// Small deterministic RNG used for reproducible sampler behavior.
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64_internal(&mut self) -> u64 {
        let mut z = self.state.wrapping_add(0x9E3779B97F4A7C15);
        self.state = z;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }
}

impl RngCore for DeterministicRng {
    fn next_u32(&mut self) -> u32 {
        self.next_u64_internal() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.next_u64_internal()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let mut offset = 0;
        while offset < dest.len() {
            let bytes = self.next_u64_internal().to_le_bytes();
            let copy_len = (dest.len() - offset).min(bytes.len());
            dest[offset..offset + copy_len].copy_from_slice(&bytes[..copy_len]);
            offset += copy_len;
        }
    }
}

/// Why a row entered the sample. The first selector to pick a row owns it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectionOrigin {
    /// Picked by a coverage rule on `column`.
    Rule {
        /// Rule column.
        column: ColumnName,
        /// Rule method.
        method: CoverageMethod,
    },
    /// High-value row accepted during amount augmentation.
    HighValue,
    /// Added by the descending-amount fill.
    AmountFill,
    /// Random padding up to the target size.
    Padding,
}

/// Insertion-ordered set of selected row indices with their origin.
///
/// Indices are never removed and never duplicated; rows are only materialized
/// through [`SampleSelection::rows`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SampleSelection {
    selected: IndexMap<RowIndex, SelectionOrigin>,
}

impl SampleSelection {
    /// Empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `index` unless already selected; returns whether it was new.
    pub(crate) fn insert(&mut self, index: RowIndex, origin: SelectionOrigin) -> bool {
        if self.selected.contains_key(&index) {
            return false;
        }
        self.selected.insert(index, origin);
        true
    }

    /// Whether `index` is selected.
    pub fn contains(&self, index: RowIndex) -> bool {
        self.selected.contains_key(&index)
    }

    /// Number of selected rows.
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    /// Whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Origin recorded for `index`.
    pub fn origin(&self, index: RowIndex) -> Option<&SelectionOrigin> {
        self.selected.get(&index)
    }

    /// Selected rows in selection order.
    pub fn iter(&self) -> impl Iterator<Item = (RowIndex, &SelectionOrigin)> + '_ {
        self.selected.iter().map(|(index, origin)| (*index, origin))
    }

    /// Selected indices in ascending table order.
    pub fn indices(&self) -> Vec<RowIndex> {
        let mut indices: Vec<RowIndex> = self.selected.keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    /// Number of rows whose origin satisfies `predicate`.
    pub fn count_where(&self, predicate: impl Fn(&SelectionOrigin) -> bool) -> usize {
        self.selected.values().filter(|origin| predicate(origin)).count()
    }

    /// Selected rows of `table` in ascending table order.
    pub fn rows<'a>(&self, table: &'a RowTable) -> impl Iterator<Item = &'a [CellValue]> + 'a {
        self.indices()
            .into_iter()
            .filter_map(move |index| table.row(index))
    }

    /// Copy the selected rows into a new table with the same header.
    pub fn to_table(&self, table: &RowTable) -> Result<RowTable, SamplerError> {
        let mut sample = RowTable::new(table.columns().iter().cloned());
        for row in self.rows(table) {
            sample.push_row(row.to_vec())?;
        }
        Ok(sample)
    }
}

/// Non-fatal condition raised during a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SamplingWarning {
    /// A rule names a column the table does not have; the rule was skipped.
    MissingColumn {
        /// Rule column.
        column: ColumnName,
    },
    /// A categorical rule's column holds no non-null values.
    EmptyRule {
        /// Rule column.
        column: ColumnName,
    },
    /// `RandomFraction` is not applied when amount coverage is active.
    RandomFractionIgnored {
        /// Rule column.
        column: ColumnName,
    },
    /// The amount column is absent; amount coverage was skipped.
    MissingAmountColumn {
        /// Configured amount column.
        column: ColumnName,
    },
    /// The customer column is absent; every high-value row was accepted.
    MissingCustomerColumn {
        /// Configured customer column.
        column: ColumnName,
    },
}

impl fmt::Display for SamplingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplingWarning::MissingColumn { column } => {
                write!(f, "column '{column}' not found; rule skipped")
            }
            SamplingWarning::EmptyRule { column } => {
                write!(f, "column '{column}' has no non-null values; rule selected 0 rows")
            }
            SamplingWarning::RandomFractionIgnored { column } => write!(
                f,
                "random rule on '{column}' ignored while amount coverage is active"
            ),
            SamplingWarning::MissingAmountColumn { column } => write!(
                f,
                "amount column '{column}' not found; amount coverage skipped"
            ),
            SamplingWarning::MissingCustomerColumn { column } => write!(
                f,
                "customer column '{column}' not found; all high-value rows accepted"
            ),
        }
    }
}

/// Figures produced by amount-coverage augmentation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AmountCoverageReport {
    /// Column the figures were computed on.
    pub amount_column: ColumnName,
    /// Sum of absolute amounts over the whole table.
    pub total_amount: f64,
    /// Amount the sample must reach.
    pub min_sample_amount: f64,
    /// Rows strictly above this amount are high value.
    pub amount_threshold: f64,
    /// High-value rows found in the table.
    pub high_value_rows: usize,
    /// High-value rows newly added to the sample.
    pub high_value_added: usize,
    /// Rows added by the descending-amount fill.
    pub filled_rows: usize,
    /// Sum of absolute amounts over the sample after augmentation.
    pub sample_amount: f64,
}

impl AmountCoverageReport {
    /// Whether the sample reaches the amount target.
    pub fn target_met(&self) -> bool {
        self.sample_amount >= self.min_sample_amount
    }

    /// Sample amount as a percentage of the table total.
    pub fn coverage_percentage(&self) -> f64 {
        percentage(self.sample_amount, self.total_amount)
    }
}

/// Result of one sampling run.
#[derive(Clone, Debug)]
pub struct SampleOutcome {
    /// Final selection.
    pub selection: SampleSelection,
    /// Seed used when the engine owned the RNG.
    pub seed: Option<u64>,
    /// Input row count.
    pub input_rows: usize,
    /// `max(floor(input * fraction), floor)`.
    pub target_size: usize,
    /// Selection size right after rule evaluation.
    pub rule_rows: usize,
    /// Rows added by padding.
    pub padded_rows: usize,
    /// Rows above the target after rule evaluation (base variant only; never trimmed).
    pub overage: Option<usize>,
    /// Present when amount coverage ran.
    pub amount: Option<AmountCoverageReport>,
    /// Non-fatal conditions in the order they were raised.
    pub warnings: Vec<SamplingWarning>,
}

impl SampleOutcome {
    /// Sample size.
    pub fn len(&self) -> usize {
        self.selection.len()
    }

    /// Whether the sample is empty.
    pub fn is_empty(&self) -> bool {
        self.selection.is_empty()
    }

    /// Sample size as a percentage of the input.
    pub fn percentage_of_input(&self) -> f64 {
        percentage(self.len() as f64, self.input_rows as f64)
    }
}

struct RulePicks {
    distinct_values: Option<usize>,
    rows: Vec<RowIndex>,
}

/// Rule-driven audit sampler.
#[derive(Clone, Debug)]
pub struct AuditSampler {
    config: SamplerConfig,
}

impl AuditSampler {
    /// Create a sampler after validating `config`.
    pub fn new(config: SamplerConfig) -> Result<Self, SamplerError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Validated configuration.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Sample `table` with an engine-owned RNG seeded from the config (or a fresh seed).
    ///
    /// The amount column, when amount coverage is active, is rewritten to absolute values.
    pub fn sample(&self, table: &mut RowTable) -> Result<SampleOutcome, SamplerError> {
        self.check_row_floor(table)?;
        let seed = self.config.seed.unwrap_or_else(rand::random);
        info!(
            "[audit:sampler] sampling {} rows (seed={})",
            table.len(),
            seed
        );
        let mut rng = DeterministicRng::new(seed);
        let mut outcome = self.sample_with_rng(table, &mut rng)?;
        outcome.seed = Some(seed);
        Ok(outcome)
    }

    /// Sample `table` drawing all randomness from `rng`.
    pub fn sample_with_rng<R: Rng + ?Sized>(
        &self,
        table: &mut RowTable,
        rng: &mut R,
    ) -> Result<SampleOutcome, SamplerError> {
        self.check_row_floor(table)?;
        let input_rows = table.len();
        let target = target_size(input_rows, &self.config);
        let mut selection = SampleSelection::new();
        let mut warnings = Vec::new();

        self.apply_rules(table, rng, &mut selection, &mut warnings);
        let rule_rows = selection.len();

        let mut overage = None;
        let amount = match &self.config.amount_coverage {
            Some(coverage) => {
                augment_amount_coverage(table, coverage, &mut selection, &mut warnings)
            }
            None => {
                if rule_rows > target {
                    info!(
                        "[audit:sampler] sample has {} rows, exceeding the target of {} to satisfy all coverage rules",
                        rule_rows, target
                    );
                    overage = Some(rule_rows - target);
                }
                None
            }
        };

        let padded_rows = pad_to_target(input_rows, target, rng, &mut selection);
        if padded_rows > 0 {
            debug!(padded_rows, target, "padded sample to target size");
        }

        let outcome = SampleOutcome {
            selection,
            seed: None,
            input_rows,
            target_size: target,
            rule_rows,
            padded_rows,
            overage,
            amount,
            warnings,
        };
        info!(
            "[audit:sampler] selected {} of {} rows ({:.2}%)",
            outcome.len(),
            input_rows,
            outcome.percentage_of_input()
        );
        Ok(outcome)
    }

    fn check_row_floor(&self, table: &RowTable) -> Result<(), SamplerError> {
        if table.len() < self.config.min_input_rows {
            return Err(SamplerError::InsufficientRows {
                rows: table.len(),
                minimum: self.config.min_input_rows,
            });
        }
        Ok(())
    }

    fn apply_rules<R: Rng + ?Sized>(
        &self,
        table: &RowTable,
        rng: &mut R,
        selection: &mut SampleSelection,
        warnings: &mut Vec<SamplingWarning>,
    ) {
        for (column, method) in self.config.rules.iter() {
            let Some(position) = table.column_position(column) else {
                warn!("[audit:sampler] column '{}' not found; skipping rule", column);
                warnings.push(SamplingWarning::MissingColumn {
                    column: column.to_string(),
                });
                continue;
            };
            if method == CoverageMethod::RandomFraction && self.config.is_extended() {
                warn!(
                    "[audit:sampler] random rule on '{}' ignored while amount coverage is active",
                    column
                );
                warnings.push(SamplingWarning::RandomFractionIgnored {
                    column: column.to_string(),
                });
                continue;
            }

            let picks = self.select_for_rule(table, position, method, rng);
            if picks.distinct_values == Some(0) {
                warn!("[audit:sampler] column '{}' has no non-null values", column);
                warnings.push(SamplingWarning::EmptyRule {
                    column: column.to_string(),
                });
            }
            let picked = picks.rows.len();
            let mut added = 0;
            for index in picks.rows {
                let origin = SelectionOrigin::Rule {
                    column: column.to_string(),
                    method,
                };
                if selection.insert(index, origin) {
                    added += 1;
                }
            }
            debug!(
                column,
                method = %method,
                distinct = ?picks.distinct_values,
                picked,
                added,
                "applied coverage rule"
            );
        }
    }

    fn select_for_rule<R: Rng + ?Sized>(
        &self,
        table: &RowTable,
        position: usize,
        method: CoverageMethod,
        rng: &mut R,
    ) -> RulePicks {
        match method {
            CoverageMethod::AtLeastOne => {
                let groups = table.group_by_value(position);
                let rows = groups
                    .values()
                    .filter_map(|rows| rows.choose(rng).copied())
                    .collect();
                RulePicks {
                    distinct_values: Some(groups.len()),
                    rows,
                }
            }
            CoverageMethod::MostValues => {
                let groups = table.group_by_value(position);
                let count = most_values_count(groups.len(), self.config.most_values_fraction);
                let chosen = index::sample(rng, groups.len(), count);
                let rows = chosen
                    .into_iter()
                    .filter_map(|value_idx| groups.get_index(value_idx))
                    .filter_map(|(_, rows)| rows.choose(rng).copied())
                    .collect();
                RulePicks {
                    distinct_values: Some(groups.len()),
                    rows,
                }
            }
            CoverageMethod::RandomFraction => {
                let count = random_fraction_count(table.len(), self.config.random_fraction);
                RulePicks {
                    distinct_values: None,
                    rows: index::sample(rng, table.len(), count).into_iter().collect(),
                }
            }
        }
    }
}

fn augment_amount_coverage(
    table: &mut RowTable,
    coverage: &AmountCoverage,
    selection: &mut SampleSelection,
    warnings: &mut Vec<SamplingWarning>,
) -> Option<AmountCoverageReport> {
    let Some(amount_position) = table.column_position(&coverage.amount_column) else {
        warn!(
            "[audit:sampler] amount column '{}' not found; skipping amount coverage",
            coverage.amount_column
        );
        warnings.push(SamplingWarning::MissingAmountColumn {
            column: coverage.amount_column.clone(),
        });
        return None;
    };
    let customer_position = match &coverage.customer_column {
        Some(column) => match table.column_position(column) {
            Some(position) => Some(position),
            None => {
                warn!(
                    "[audit:sampler] customer column '{}' not found; accepting every high-value row",
                    column
                );
                warnings.push(SamplingWarning::MissingCustomerColumn {
                    column: column.clone(),
                });
                None
            }
        },
        None => None,
    };

    let amounts = table.normalize_amounts(amount_position);
    let total_amount: f64 = amounts.iter().sum();
    let min_sample_amount = total_amount * coverage.min_coverage_fraction;
    let amount_threshold = total_amount * coverage.high_value_fraction;

    let mut by_amount: Vec<RowIndex> = (0..amounts.len()).collect();
    by_amount.sort_by(|&a, &b| amounts[b].total_cmp(&amounts[a]).then_with(|| a.cmp(&b)));
    let high_value: Vec<RowIndex> = by_amount
        .iter()
        .copied()
        .filter(|&index| amounts[index] > amount_threshold)
        .collect();

    let mut high_value_added = 0;
    match customer_position {
        Some(customer) => {
            let mut represented: HashSet<ValueKey> = selection
                .iter()
                .filter_map(|(index, _)| table.cell(index, customer).and_then(CellValue::key))
                .collect();
            let mut accepted_amounts: HashSet<u64> = HashSet::new();
            for &index in &high_value {
                let amount_key = amounts[index].to_bits();
                if accepted_amounts.contains(&amount_key) {
                    continue;
                }
                let customer_key = table.cell(index, customer).and_then(CellValue::key);
                if customer_key
                    .as_ref()
                    .is_some_and(|key| represented.contains(key))
                {
                    continue;
                }
                if selection.insert(index, SelectionOrigin::HighValue) {
                    high_value_added += 1;
                }
                accepted_amounts.insert(amount_key);
                if let Some(key) = customer_key {
                    represented.insert(key);
                }
            }
        }
        None => {
            for &index in &high_value {
                if selection.insert(index, SelectionOrigin::HighValue) {
                    high_value_added += 1;
                }
            }
        }
    }

    let mut sample_amount: f64 = selection.iter().map(|(index, _)| amounts[index]).sum();
    let mut filled_rows = 0;
    for &index in &by_amount {
        if sample_amount >= min_sample_amount {
            break;
        }
        if selection.insert(index, SelectionOrigin::AmountFill) {
            sample_amount += amounts[index];
            filled_rows += 1;
        }
    }

    let report = AmountCoverageReport {
        amount_column: coverage.amount_column.clone(),
        total_amount,
        min_sample_amount,
        amount_threshold,
        high_value_rows: high_value.len(),
        high_value_added,
        filled_rows,
        sample_amount,
    };
    info!(
        "[audit:sampler] amount coverage {:.2}% (sample={:.2}, target={:.2}, high_value={}/{}, filled={})",
        report.coverage_percentage(),
        sample_amount,
        min_sample_amount,
        high_value_added,
        high_value.len(),
        filled_rows
    );
    Some(report)
}

fn pad_to_target<R: Rng + ?Sized>(
    rows: usize,
    target: usize,
    rng: &mut R,
    selection: &mut SampleSelection,
) -> usize {
    if selection.len() >= target {
        return 0;
    }
    let remaining: Vec<RowIndex> = (0..rows).filter(|index| !selection.contains(*index)).collect();
    let needed = (target - selection.len()).min(remaining.len());
    let mut added = 0;
    for pick in index::sample(rng, remaining.len(), needed).into_iter() {
        if selection.insert(remaining[pick], SelectionOrigin::Padding) {
            added += 1;
        }
    }
    added
}
