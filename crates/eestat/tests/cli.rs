use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use anyhow::{Context, Result};
use serde_json::Value;

const ECONOMY: &str = "Year,Total,Food and non-alcoholic beverages\n\
                       2019,2.3,1.8\n\
                       2020,-0.4,1.0\n\
                       2021,4.6,2.1\n";

const EDUCATION: &str = ",Type and level of education,2019,2020\n\
                         0,Primary education,6200,6150\n\
                         1,Higher education,4500,..\n";

fn eestat(root: &Path, args: &[&str]) -> Result<Output> {
    Command::new(env!("CARGO_BIN_EXE_eestat"))
        .arg("--local-root")
        .arg(root)
        .args(args)
        .env("EESTAT_REPORT_DIR", root.join("local-reports"))
        .env("RUST_LOG", "off")
        .output()
        .context("failed to run eestat")
}

fn seed(root: &Path, bucket: &str, name: &str, body: &str) -> Result<()> {
    let dir = root.join(bucket);
    fs::create_dir_all(&dir)?;
    fs::write(dir.join(name), body)?;
    Ok(())
}

fn statuses(summary: &Value) -> Vec<(String, String)> {
    summary["datasets"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .map(|entry| {
                    (
                        entry["dataset"].as_str().unwrap_or_default().to_string(),
                        entry["status"].as_str().unwrap_or_default().to_string(),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn run_with_local_buckets_reports_partial_success() -> Result<()> {
    let root = tempfile::tempdir()?;
    seed(root.path(), "estonia-bronze", "economy_data.csv", ECONOMY)?;
    seed(root.path(), "estonia-bronze", "education_data.csv", EDUCATION)?;

    let output = eestat(root.path(), &["run", "--summary-json"])?;
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summaries: Vec<Value> = serde_json::from_slice(&output.stdout)?;
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0]["job"], "transform");
    assert_eq!(
        statuses(&summaries[0]),
        vec![
            ("economy_data.csv".to_string(), "succeeded".to_string()),
            ("income_data.csv".to_string(), "failed".to_string()),
            ("employment_data.csv".to_string(), "failed".to_string()),
            ("education_data.csv".to_string(), "succeeded".to_string()),
        ]
    );

    let cleaned = fs::read_to_string(
        root.path()
            .join("estonia-silver")
            .join("transformed_economy_data.csv"),
    )?;
    assert!(cleaned.starts_with("Year,Total,Food and non-alcoholic beverages\n"));

    assert_eq!(summaries[1]["job"], "report");
    let gold = root.path().join("estonia-gold");
    for document in ["economy_data_summary.pdf", "education_data_summary.pdf"] {
        let bytes = fs::read(gold.join(format!("summary_from {document}")))?;
        assert!(bytes.starts_with(b"%PDF"), "{document} is not a PDF");
        assert!(root.path().join("local-reports").join(document).exists());
    }
    assert!(!gold.join("summary_from income_data_summary.pdf").exists());
    Ok(())
}

#[test]
fn datasets_lists_the_builtin_catalog() -> Result<()> {
    let root = tempfile::tempdir()?;
    let output = eestat(root.path(), &["datasets"])?;
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout)?;
    for expected in [
        "economy_data.csv",
        "transformed_education_data.csv",
        "employment_data_summary.pdf (2 pages)",
    ] {
        assert!(stdout.contains(expected), "missing {expected:?} in:\n{stdout}");
    }
    Ok(())
}

#[test]
fn a_custom_catalog_replaces_the_builtin_one() -> Result<()> {
    let root = tempfile::tempdir()?;
    seed(root.path(), "estonia-bronze", "prices.csv", ECONOMY)?;
    let rules = root.path().join("rules.toml");
    fs::write(
        &rules,
        r#"
        [[transform.rules]]
        dataset = "prices.csv"
        kind = "coerce_numeric"
        skip_leading = 1
        "#,
    )?;

    let rules_arg = rules.to_string_lossy().to_string();
    let output = eestat(
        root.path(),
        &["transform", "--rules", rules_arg.as_str(), "--summary-json"],
    )?;
    assert!(output.status.success());

    let summaries: Vec<Value> = serde_json::from_slice(&output.stdout)?;
    assert_eq!(
        statuses(&summaries[0]),
        vec![("prices.csv".to_string(), "succeeded".to_string())]
    );
    assert!(root
        .path()
        .join("estonia-silver")
        .join("transformed_prices.csv")
        .exists());
    Ok(())
}

#[test]
fn an_invalid_catalog_is_fatal() -> Result<()> {
    let root = tempfile::tempdir()?;
    let rules = root.path().join("rules.toml");
    fs::write(&rules, "[[transform.rules]]\ndataset = \"a.csv\"\nkind = \"pivot\"\n")?;

    let rules_arg = rules.to_string_lossy().to_string();
    let output = eestat(root.path(), &["transform", "--rules", rules_arg.as_str()])?;
    assert!(!output.status.success());
    Ok(())
}
