/// Constants used by the sampling engine (floors and fractions).
pub mod sampler {
    /// Minimum number of input rows required before any sampling happens.
    pub const MIN_INPUT_ROWS: usize = 20;
    /// Minimum number of rows in any emitted sample.
    pub const MIN_SAMPLE_ROWS: usize = 20;
    /// Fraction of the input used as the row-count target (before the floor applies).
    pub const TARGET_SIZE_FRACTION: f64 = 0.05;
    /// Fraction of distinct values covered by the `MostValues` method.
    pub const MOST_VALUES_FRACTION: f64 = 0.85;
    /// Fraction of all rows drawn by the `RandomFraction` method.
    pub const RANDOM_FRACTION: f64 = 0.05;
}

/// Constants used by amount-coverage augmentation.
pub mod amount {
    /// Share of the total absolute amount the sample must cover.
    pub const MIN_COVERAGE_FRACTION: f64 = 0.10;
    /// Share of the total absolute amount above which a row counts as high value.
    pub const HIGH_VALUE_FRACTION: f64 = 0.05;
    /// Thousands separator stripped before parsing amount text.
    pub const THOUSANDS_SEPARATOR: char = ',';
}

/// Defaults used by the command-line runner.
pub mod defaults {
    use crate::config::CoverageMethod;

    /// Input file used when none is given.
    pub const INPUT_FILE: &str = "Test.csv";
    /// Suffix appended to the input stem to build the output file name.
    pub const OUTPUT_SUFFIX: &str = " Audit Sample.csv";
    /// Amount column used by the extended variant when none is given.
    pub const AMOUNT_COLUMN: &str = "Amount";
    /// Customer column used by the extended variant when none is given.
    pub const CUSTOMER_COLUMN: &str = "Customer Name";
    /// Default rule set applied when no rules are supplied.
    pub const RULES: [(&str, CoverageMethod); 4] = [
        ("Branch", CoverageMethod::AtLeastOne),
        ("Invoice Date", CoverageMethod::AtLeastOne),
        ("Customer Name", CoverageMethod::AtLeastOne),
        ("Item Main Group", CoverageMethod::MostValues),
    ];
}
