use std::collections::HashSet;
use std::fs;
use std::path::Path;

use audit_sampler::CellValue;
use audit_sampler::apps::run_audit_sample;
use audit_sampler::transport::read_csv_path;
use serde_json::Value;
use tempfile::tempdir;

fn write_ledger(path: &Path, rows: usize) {
    let mut body = String::from("Branch,Invoice Date,Customer Name,Item Main Group,Amount\n");
    for index in 0..rows {
        body.push_str(&format!(
            "{},2025-02-{:02},Customer {},Group {},{}\n",
            ["North", "South", "East"][index % 3],
            1 + index % 28,
            index % 17,
            index % 9,
            if index == 0 {
                "\"-12,500.00\"".to_string()
            } else {
                format!("{}.{:02}", 10 + index % 40, index % 3 * 10)
            }
        ));
    }
    fs::write(path, body).unwrap();
}

fn run(args: &[&str]) -> Result<(), Box<dyn std::error::Error>> {
    run_audit_sample(args.iter().map(|arg| arg.to_string()))
}

#[test]
fn default_run_writes_sample_next_to_input() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("Test.csv");
    write_ledger(&input, 250);
    let input_arg = input.to_string_lossy().into_owned();

    run(&[&input_arg, "--seed", "42"]).unwrap();

    let output = temp.path().join("Test Audit Sample.csv");
    let written = fs::read_to_string(&output).unwrap();
    let source = fs::read_to_string(&input).unwrap();
    let source_lines: HashSet<&str> = source.lines().collect();
    let mut lines = written.lines();
    assert_eq!(lines.next(), source.lines().next());
    let mut rows = 0;
    for line in lines {
        assert!(source_lines.contains(line), "rewritten row: {line}");
        rows += 1;
    }
    assert!(rows >= 20);
}

#[test]
fn seeded_runs_write_identical_files() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("Ledger.csv");
    write_ledger(&input, 400);
    let input_arg = input.to_string_lossy().into_owned();
    let first = temp.path().join("first.csv");
    let second = temp.path().join("second.csv");

    for output in [&first, &second] {
        let output_arg = output.to_string_lossy().into_owned();
        run(&[
            &input_arg,
            "-o",
            &output_arg,
            "--rule",
            "Branch=1",
            "--rule",
            "Customer Name=most-values",
            "--seed",
            "7",
        ])
        .unwrap();
    }
    assert_eq!(
        fs::read_to_string(&first).unwrap(),
        fs::read_to_string(&second).unwrap()
    );
}

#[test]
fn too_few_rows_fail_without_writing() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("Small.csv");
    write_ledger(&input, 19);
    let input_arg = input.to_string_lossy().into_owned();

    assert!(run(&[&input_arg, "--seed", "1"]).is_err());
    assert!(!temp.path().join("Small Audit Sample.csv").exists());
}

#[test]
fn amount_coverage_run_writes_summary_json() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("Ledger.csv");
    write_ledger(&input, 300);
    let input_arg = input.to_string_lossy().into_owned();
    let summary_path = temp.path().join("summary.json");
    let summary_arg = summary_path.to_string_lossy().into_owned();

    run(&[
        &input_arg,
        "--amount-coverage",
        "--seed",
        "5",
        "--summary-json",
        &summary_arg,
    ])
    .unwrap();

    let summary: Value = serde_json::from_str(&fs::read_to_string(&summary_path).unwrap()).unwrap();
    assert_eq!(summary["seed"], 5);
    assert_eq!(summary["input_rows"], 300);
    let amount = &summary["amount"];
    assert!(amount["sample_amount"].as_f64().unwrap() >= amount["min_sample_amount"].as_f64().unwrap());
    // Customer 0 already holds a rule-selected row, so the one high-value row is left to the fill.
    assert_eq!(amount["high_value_rows"], 1);
    assert_eq!(amount["high_value_added"], 0);
    assert_eq!(summary["coverage"].as_array().unwrap().len(), 4);

    let sample = read_csv_path(&temp.path().join("Ledger Audit Sample.csv")).unwrap();
    assert_eq!(summary["sample_rows"].as_u64().unwrap() as usize, sample.len());
    // Amounts in the written sample are absolute.
    let amount_column = sample.column_position("Amount").unwrap();
    assert!((0..sample.len()).all(|index| matches!(
        sample.cell(index, amount_column),
        Some(CellValue::Number { value, .. }) if *value >= 0.0
    )));
}

#[test]
fn missing_rule_column_is_not_fatal() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("Ledger.csv");
    write_ledger(&input, 60);
    let input_arg = input.to_string_lossy().into_owned();

    run(&[&input_arg, "--rule", "Region=1", "--rule", "Branch=1", "--seed", "3"]).unwrap();
    let sample = read_csv_path(&temp.path().join("Ledger Audit Sample.csv")).unwrap();
    assert_eq!(sample.len(), 20);
}

#[test]
fn list_methods_and_help_exit_cleanly() {
    run(&["--list-methods"]).unwrap();
    run(&["--help"]).unwrap();
    assert!(run(&["--rule", "Branch"]).is_err());
}
