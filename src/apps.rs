use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use clap::{Parser, error::ErrorKind};

use crate::config::{AmountCoverage, CoverageMethod, SamplerConfig};
use crate::constants::defaults;
use crate::errors::SamplerError;
use crate::heuristics::{format_amount, format_usize_with_commas};
use crate::metrics::SampleSummary;
use crate::sampler::{AuditSampler, SampleOutcome};
use crate::transport::{default_output_path, read_csv_path, write_csv_path};
use crate::types::ColumnName;

/// One `--rule COLUMN=METHOD` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RuleArg {
    column: ColumnName,
    method: CoverageMethod,
}

#[derive(Debug, Parser)]
#[command(
    name = "audit_sample",
    disable_help_subcommand = true,
    about = "Draw a representative audit sample from a CSV file",
    long_about = "Select rows so that every coverage rule holds, pad the sample to max(5% of rows, 20), and optionally guarantee that the sample covers 10% of the total amount.",
    after_help = "Methods: 1 = at least one row per value, 2 = most (85%) values, 3 = random 5% of rows. Without --rule the default rule set is used."
)]
/// CLI for `audit_sample`.
///
/// Common usage:
/// - Default rules and output name: `audit_sample Ledger.csv` (writes `Ledger Audit Sample.csv`)
/// - Explicit rules: `--rule Branch=1 --rule "Item Main Group=most-values"`
/// - Amount coverage with default columns: `--amount-coverage`
/// - Reproducible run: `--seed 42`
struct AuditSampleCli {
    #[arg(
        value_name = "INPUT",
        default_value = defaults::INPUT_FILE,
        help = "CSV file to be audited"
    )]
    input: PathBuf,
    #[arg(
        long,
        short = 'o',
        value_name = "PATH",
        help = "Output CSV path (defaults to '<input stem> Audit Sample.csv' next to the input)"
    )]
    output: Option<PathBuf>,
    #[arg(
        long = "rule",
        value_name = "COLUMN=METHOD",
        value_parser = parse_rule_arg,
        help = "Coverage rule; repeat in evaluation order. METHOD is 1/2/3 or at-least-one/most-values/random"
    )]
    rules: Vec<RuleArg>,
    #[arg(
        long = "amount-coverage",
        help = "Guarantee amount coverage using the default amount and customer columns"
    )]
    amount_coverage: bool,
    #[arg(
        long = "amount-column",
        value_name = "COLUMN",
        help = "Amount column for amount coverage (implies --amount-coverage; blank keeps the default)"
    )]
    amount_column: Option<String>,
    #[arg(
        long = "customer-column",
        value_name = "COLUMN",
        conflicts_with = "no_customer_column",
        help = "Customer column limiting high-value rows to one per customer (implies --amount-coverage)"
    )]
    customer_column: Option<String>,
    #[arg(
        long = "no-customer-column",
        help = "Accept every high-value row regardless of customer (implies --amount-coverage)"
    )]
    no_customer_column: bool,
    #[arg(long, help = "Deterministic seed; a fresh seed is drawn and reported when omitted")]
    seed: Option<u64>,
    #[arg(
        long,
        value_name = "FILE",
        help = "JSON sampler configuration; explicit flags override it"
    )]
    config: Option<PathBuf>,
    #[arg(
        long = "summary-json",
        value_name = "PATH",
        help = "Write a JSON run summary to PATH"
    )]
    summary_json: Option<PathBuf>,
    #[arg(long = "list-methods", help = "Print the coverage method menu and exit")]
    list_methods: bool,
}

/// Parse args, sample the input CSV, and write the audit sample next to it.
pub fn run_audit_sample<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) = parse_cli::<AuditSampleCli, _>(
        std::iter::once("audit_sample".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    if cli.list_methods {
        print_method_menu();
        return Ok(());
    }

    let config = resolve_config(&cli)?;
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));

    println!("=== audit sample ===");
    println!("input : {}", cli.input.display());
    println!("output: {}", output.display());
    if cli.rules.is_empty() && cli.config.is_none() {
        println!("no rules provided; using the default rule set");
    }
    println!("[RULES]");
    if config.rules.is_empty() {
        println!("  (none)");
    }
    for (column, method) in config.rules.iter() {
        println!("  {column}: {method}");
    }
    if let Some(amount) = &config.amount_coverage {
        println!("[AMOUNT COVERAGE]");
        println!("  amount column  : {}", amount.amount_column);
        println!(
            "  customer column: {}",
            amount.customer_column.as_deref().unwrap_or("(none)")
        );
    }

    let mut table = read_csv_path(&cli.input)?;
    let sampler = AuditSampler::new(config)?;
    let outcome = match sampler.sample(&mut table) {
        Ok(outcome) => outcome,
        Err(err @ SamplerError::InsufficientRows { .. }) => {
            println!("no sample written: {err}");
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    print_outcome(&outcome);
    let written = write_csv_path(&output, &table, &outcome.selection)?;
    println!(
        "sampled data saved to {} ({} rows, {:.2}% of {})",
        output.display(),
        format_usize_with_commas(written),
        outcome.percentage_of_input(),
        format_usize_with_commas(outcome.input_rows)
    );

    if let Some(path) = &cli.summary_json {
        let summary = SampleSummary::from_outcome(&table, sampler.config(), &outcome);
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, &summary)?;
        println!("summary written to {}", path.display());
    }
    Ok(())
}

fn resolve_config(cli: &AuditSampleCli) -> Result<SamplerConfig, SamplerError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => SamplerConfig::default(),
    };
    if !cli.rules.is_empty() {
        config.rules = cli
            .rules
            .iter()
            .map(|rule| (rule.column.clone(), rule.method))
            .collect();
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }

    let amount_column = non_blank(cli.amount_column.as_deref());
    let customer_column = non_blank(cli.customer_column.as_deref());
    let wants_amount = cli.amount_coverage
        || cli.no_customer_column
        || cli.amount_column.is_some()
        || cli.customer_column.is_some();
    if wants_amount {
        let mut amount = config.amount_coverage.take().unwrap_or_default();
        if let Some(column) = amount_column {
            amount.amount_column = column;
        }
        if let Some(column) = customer_column {
            amount.customer_column = Some(column);
        }
        if cli.no_customer_column {
            amount.customer_column = None;
        }
        config.amount_coverage = Some(amount);
    }

    config.validate()?;
    Ok(config)
}

fn load_config(path: &Path) -> Result<SamplerConfig, SamplerError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn non_blank(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn print_method_menu() {
    println!("Coverage methods:");
    for method in CoverageMethod::ALL {
        println!("{}) {}", method.menu_option(), method.label());
    }
}

fn print_outcome(outcome: &SampleOutcome) {
    for warning in &outcome.warnings {
        println!("warning: {warning}");
    }
    if let Some(seed) = outcome.seed {
        println!("seed: {seed} (pass --seed {seed} to reproduce)");
    }
    println!(
        "rows: {} selected by rules, {} padded, target {}",
        format_usize_with_commas(outcome.rule_rows),
        format_usize_with_commas(outcome.padded_rows),
        format_usize_with_commas(outcome.target_size)
    );
    if outcome.overage.is_some() {
        println!(
            "note: final sample has {} rows, which exceeds the target of {} to satisfy all coverage rules",
            format_usize_with_commas(outcome.len()),
            format_usize_with_commas(outcome.target_size)
        );
    }
    if let Some(amount) = &outcome.amount {
        println!(
            "amount coverage: {} of {} ({:.2}%, target {})",
            format_amount(amount.sample_amount),
            format_amount(amount.total_amount),
            amount.coverage_percentage(),
            format_amount(amount.min_sample_amount)
        );
        println!(
            "high-value rows: {} added of {} above {}; {} rows added by amount fill",
            amount.high_value_added,
            amount.high_value_rows,
            format_amount(amount.amount_threshold),
            amount.filled_rows
        );
    }
}

fn parse_rule_arg(raw: &str) -> Result<RuleArg, String> {
    let (column, method) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("--rule expects COLUMN=METHOD, got '{raw}'"))?;
    let column = column.trim();
    if column.is_empty() {
        return Err(format!("--rule '{raw}' has an empty column name"));
    }
    let method = method
        .parse::<CoverageMethod>()
        .map_err(|err| err.to_string())?;
    Ok(RuleArg {
        column: column.to_string(),
        method,
    })
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> AuditSampleCli {
        AuditSampleCli::try_parse_from(std::iter::once("audit_sample").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn rule_args_accept_numbers_and_names() {
        assert_eq!(
            parse_rule_arg("Invoice Date=1").unwrap(),
            RuleArg {
                column: "Invoice Date".to_string(),
                method: CoverageMethod::AtLeastOne
            }
        );
        assert_eq!(
            parse_rule_arg(" Item Main Group = most-values").unwrap().method,
            CoverageMethod::MostValues
        );
        assert!(parse_rule_arg("Branch").is_err());
        assert!(parse_rule_arg("=1").is_err());
        assert!(parse_rule_arg("Branch=9").is_err());
    }

    #[test]
    fn defaults_apply_without_flags() {
        let cli = parse(&[]);
        assert_eq!(cli.input, PathBuf::from(defaults::INPUT_FILE));
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.rules, crate::config::CoverageRules::defaults());
        assert!(config.amount_coverage.is_none());
        assert!(config.seed.is_none());
    }

    #[test]
    fn explicit_rules_replace_defaults_in_order() {
        let cli = parse(&["in.csv", "--rule", "Region=2", "--rule", "Branch=random", "--seed", "9"]);
        let config = resolve_config(&cli).unwrap();
        let rules: Vec<_> = config.rules.iter().collect();
        assert_eq!(
            rules,
            vec![
                ("Region", CoverageMethod::MostValues),
                ("Branch", CoverageMethod::RandomFraction)
            ]
        );
        assert_eq!(config.seed, Some(9));
    }

    #[test]
    fn amount_flags_enable_extended_variant_with_defaults() {
        let config = resolve_config(&parse(&["--amount-coverage"])).unwrap();
        assert_eq!(config.amount_coverage, Some(AmountCoverage::default()));

        let config = resolve_config(&parse(&["--amount-column", "  "])).unwrap();
        let amount = config.amount_coverage.expect("amount coverage");
        assert_eq!(amount.amount_column, defaults::AMOUNT_COLUMN);

        let config = resolve_config(&parse(&[
            "--amount-column",
            "Net",
            "--no-customer-column",
        ]))
        .unwrap();
        let amount = config.amount_coverage.expect("amount coverage");
        assert_eq!(amount.amount_column, "Net");
        assert_eq!(amount.customer_column, None);
    }

    #[test]
    fn config_file_is_overridden_by_flags() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("sampler.json");
        fs::write(
            &path,
            r#"{ "seed": 1, "rules": { "Branch": "at-least-one" }, "amount_coverage": { "amount_column": "Gross" } }"#,
        )
        .unwrap();
        let path_arg = path.to_string_lossy().into_owned();
        let cli = parse(&["--config", &path_arg, "--seed", "2", "--customer-column", "Client"]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.seed, Some(2));
        assert_eq!(config.rules.get("Branch"), Some(CoverageMethod::AtLeastOne));
        let amount = config.amount_coverage.expect("amount coverage");
        assert_eq!(amount.amount_column, "Gross");
        assert_eq!(amount.customer_column.as_deref(), Some("Client"));
    }

    #[test]
    fn help_is_not_an_error() {
        let parsed = parse_cli::<AuditSampleCli, _>(["audit_sample", "--help"]).unwrap();
        assert!(parsed.is_none());
    }
}
