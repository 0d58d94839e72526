use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::amount::{HIGH_VALUE_FRACTION, MIN_COVERAGE_FRACTION};
use crate::constants::defaults;
use crate::constants::sampler::{
    MIN_INPUT_ROWS, MIN_SAMPLE_ROWS, MOST_VALUES_FRACTION, RANDOM_FRACTION, TARGET_SIZE_FRACTION,
};
use crate::errors::SamplerError;
use crate::types::ColumnName;

/// How a coverage rule selects rows for its column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoverageMethod {
    /// Every distinct non-null value is represented by one random row.
    AtLeastOne,
    /// A random 85% of the distinct non-null values are represented by one row each.
    MostValues,
    /// A random 5% of all rows, independent of the column.
    RandomFraction,
}

impl CoverageMethod {
    /// All methods in menu order.
    pub const ALL: [CoverageMethod; 3] = [
        CoverageMethod::AtLeastOne,
        CoverageMethod::MostValues,
        CoverageMethod::RandomFraction,
    ];

    /// Numbered menu option (1-based) shown by the command-line runner.
    pub fn menu_option(self) -> u8 {
        match self {
            CoverageMethod::AtLeastOne => 1,
            CoverageMethod::MostValues => 2,
            CoverageMethod::RandomFraction => 3,
        }
    }

    /// Resolve a numbered menu option.
    pub fn from_menu_option(option: u8) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|method| method.menu_option() == option)
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            CoverageMethod::AtLeastOne => "At least one",
            CoverageMethod::MostValues => "Most values",
            CoverageMethod::RandomFraction => "Random",
        }
    }

    /// Whether the method groups rows by the distinct values of its column.
    pub fn is_categorical(self) -> bool {
        !matches!(self, CoverageMethod::RandomFraction)
    }
}

impl fmt::Display for CoverageMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CoverageMethod {
    type Err = SamplerError;

    /// Accepts a menu number (`1`), a kebab name (`at-least-one`), or a label (`At least one`).
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if let Ok(option) = trimmed.parse::<u8>() {
            return Self::from_menu_option(option).ok_or_else(|| {
                SamplerError::Configuration(format!(
                    "unknown method option {option}; expected 1-{}",
                    Self::ALL.len()
                ))
            });
        }
        let normalized: String = trimmed
            .chars()
            .map(|ch| match ch {
                ' ' | '_' => '-',
                other => other.to_ascii_lowercase(),
            })
            .collect();
        match normalized.as_str() {
            "at-least-one" | "atleastone" => Ok(CoverageMethod::AtLeastOne),
            "most-values" | "mostvalues" => Ok(CoverageMethod::MostValues),
            "random" | "random-fraction" | "randomfraction" => Ok(CoverageMethod::RandomFraction),
            _ => Err(SamplerError::Configuration(format!(
                "unknown coverage method '{trimmed}'"
            ))),
        }
    }
}

/// Insertion-ordered mapping from column name to coverage method.
///
/// Column names are unique. Re-inserting a column replaces its method but keeps
/// its original position, so evaluation order always follows first mention.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoverageRules {
    rules: IndexMap<ColumnName, CoverageMethod>,
}

impl CoverageRules {
    /// Create an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The documented default rule set (Branch, Invoice Date, Customer Name, Item Main Group).
    pub fn defaults() -> Self {
        defaults::RULES
            .iter()
            .map(|(column, method)| ((*column).to_string(), *method))
            .collect()
    }

    /// Builder-style insert.
    pub fn with_rule(mut self, column: impl Into<ColumnName>, method: CoverageMethod) -> Self {
        self.insert(column, method);
        self
    }

    /// Insert or replace the rule for `column`, returning the previous method.
    pub fn insert(
        &mut self,
        column: impl Into<ColumnName>,
        method: CoverageMethod,
    ) -> Option<CoverageMethod> {
        self.rules.insert(column.into(), method)
    }

    /// Method configured for `column`, if any.
    pub fn get(&self, column: &str) -> Option<CoverageMethod> {
        self.rules.get(column).copied()
    }

    /// Rules in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, CoverageMethod)> + '_ {
        self.rules
            .iter()
            .map(|(column, method)| (column.as_str(), *method))
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are configured.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<C: Into<ColumnName>> FromIterator<(C, CoverageMethod)> for CoverageRules {
    fn from_iter<I: IntoIterator<Item = (C, CoverageMethod)>>(iter: I) -> Self {
        let mut rules = CoverageRules::new();
        for (column, method) in iter {
            rules.insert(column, method);
        }
        rules
    }
}

/// Value-amount coverage target used by the extended sampling variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmountCoverage {
    /// Column holding monetary amounts; normalized to absolute values during the run.
    pub amount_column: ColumnName,
    /// Column identifying the customer; limits high-value picks to one per customer.
    pub customer_column: Option<ColumnName>,
    /// Share of the total absolute amount the sample must cover (default 0.10).
    pub min_coverage_fraction: f64,
    /// Share of the total absolute amount above which a row is high value (default 0.05).
    pub high_value_fraction: f64,
}

impl AmountCoverage {
    /// Target on `amount_column` without a customer column.
    pub fn new(amount_column: impl Into<ColumnName>) -> Self {
        Self {
            amount_column: amount_column.into(),
            customer_column: None,
            ..Self::default()
        }
    }

    /// Set the customer column used to de-duplicate high-value picks.
    pub fn with_customer_column(mut self, customer_column: impl Into<ColumnName>) -> Self {
        self.customer_column = Some(customer_column.into());
        self
    }
}

impl Default for AmountCoverage {
    fn default() -> Self {
        Self {
            amount_column: defaults::AMOUNT_COLUMN.to_string(),
            customer_column: Some(defaults::CUSTOMER_COLUMN.to_string()),
            min_coverage_fraction: MIN_COVERAGE_FRACTION,
            high_value_fraction: HIGH_VALUE_FRACTION,
        }
    }
}

/// Top-level sampler configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// RNG seed; `None` draws a fresh seed per run (reported in the outcome).
    pub seed: Option<u64>,
    /// Per-column coverage rules, evaluated in order.
    pub rules: CoverageRules,
    /// Enables the extended variant when set.
    pub amount_coverage: Option<AmountCoverage>,
    /// Inputs with fewer rows abort the run.
    pub min_input_rows: usize,
    /// Floor on the output row count.
    pub min_sample_rows: usize,
    /// Fraction of the input used as the row-count target before the floor applies.
    pub target_size_fraction: f64,
    /// Fraction of distinct values covered by `MostValues`.
    pub most_values_fraction: f64,
    /// Fraction of all rows drawn by `RandomFraction`.
    pub random_fraction: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            seed: None,
            rules: CoverageRules::defaults(),
            amount_coverage: None,
            min_input_rows: MIN_INPUT_ROWS,
            min_sample_rows: MIN_SAMPLE_ROWS,
            target_size_fraction: TARGET_SIZE_FRACTION,
            most_values_fraction: MOST_VALUES_FRACTION,
            random_fraction: RANDOM_FRACTION,
        }
    }
}

impl SamplerConfig {
    /// Whether amount coverage (the extended variant) is active.
    pub fn is_extended(&self) -> bool {
        self.amount_coverage.is_some()
    }

    /// Reject fractions outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), SamplerError> {
        let mut fractions = vec![
            ("target_size_fraction", self.target_size_fraction),
            ("most_values_fraction", self.most_values_fraction),
            ("random_fraction", self.random_fraction),
        ];
        if let Some(amount) = &self.amount_coverage {
            fractions.push(("min_coverage_fraction", amount.min_coverage_fraction));
            fractions.push(("high_value_fraction", amount.high_value_fraction));
            if amount.amount_column.trim().is_empty() {
                return Err(SamplerError::Configuration(
                    "amount column name must not be empty".to_string(),
                ));
            }
        }
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(SamplerError::Configuration(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn methods_parse_from_numbers_names_and_labels() {
        assert_eq!(
            "1".parse::<CoverageMethod>().unwrap(),
            CoverageMethod::AtLeastOne
        );
        assert_eq!(
            "most-values".parse::<CoverageMethod>().unwrap(),
            CoverageMethod::MostValues
        );
        assert_eq!(
            "Most values".parse::<CoverageMethod>().unwrap(),
            CoverageMethod::MostValues
        );
        assert_eq!(
            " Random ".parse::<CoverageMethod>().unwrap(),
            CoverageMethod::RandomFraction
        );
        assert!("4".parse::<CoverageMethod>().is_err());
        assert!("sometimes".parse::<CoverageMethod>().is_err());
    }

    #[test]
    fn menu_options_round_trip_for_every_method() {
        for method in CoverageMethod::ALL {
            assert_eq!(
                CoverageMethod::from_menu_option(method.menu_option()),
                Some(method)
            );
        }
        assert_eq!(CoverageMethod::from_menu_option(0), None);
    }

    #[test]
    fn reinserting_a_rule_keeps_its_position() {
        let mut rules = CoverageRules::new()
            .with_rule("Branch", CoverageMethod::AtLeastOne)
            .with_rule("Region", CoverageMethod::MostValues);
        let previous = rules.insert("Branch", CoverageMethod::RandomFraction);
        assert_eq!(previous, Some(CoverageMethod::AtLeastOne));

        let ordered: Vec<_> = rules.iter().collect();
        assert_eq!(
            ordered,
            vec![
                ("Branch", CoverageMethod::RandomFraction),
                ("Region", CoverageMethod::MostValues),
            ]
        );
    }

    #[test]
    fn default_rules_match_documented_set() {
        let rules = CoverageRules::defaults();
        assert_eq!(rules.len(), 4);
        assert_eq!(rules.get("Branch"), Some(CoverageMethod::AtLeastOne));
        assert_eq!(rules.get("Invoice Date"), Some(CoverageMethod::AtLeastOne));
        assert_eq!(rules.get("Customer Name"), Some(CoverageMethod::AtLeastOne));
        assert_eq!(rules.get("Item Main Group"), Some(CoverageMethod::MostValues));
    }

    #[test]
    fn config_loads_from_partial_json_in_rule_order() {
        let raw = r#"{
            "seed": 7,
            "rules": { "Region": "most-values", "Branch": "at-least-one" },
            "amount_coverage": { "amount_column": "Net" }
        }"#;
        let config: SamplerConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.seed, Some(7));
        let columns: Vec<_> = config.rules.iter().map(|(column, _)| column).collect();
        assert_eq!(columns, vec!["Region", "Branch"]);
        let amount = config.amount_coverage.as_ref().expect("amount coverage");
        assert_eq!(amount.amount_column, "Net");
        assert_eq!(amount.customer_column.as_deref(), Some("Customer Name"));
        assert_eq!(config.min_input_rows, MIN_INPUT_ROWS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_fractions() {
        let config = SamplerConfig {
            most_values_fraction: 1.5,
            ..SamplerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SamplerError::Configuration(_))
        ));

        let config = SamplerConfig {
            amount_coverage: Some(AmountCoverage {
                high_value_fraction: -0.1,
                ..AmountCoverage::default()
            }),
            ..SamplerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
