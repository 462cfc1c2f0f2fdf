use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use eestat_bucket::{BucketStore, LocalBucketStore, S3BucketStore, S3Config};
use eestat_core::catalog::CleaningRule;
use eestat_core::{run_report_job, run_transform_job, Buckets, Catalog, EtlConfig, JobSummary};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Statistics Estonia cleaning and reporting jobs", long_about = None)]
struct Cli {
    /// Use directory-backed buckets under this root instead of S3
    #[arg(long, global = true)]
    local_root: Option<PathBuf>,
    /// Rule catalog (TOML) to use instead of the built-in one
    #[arg(long, global = true)]
    rules: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean raw CSVs into the transformed bucket
    Transform(JobArgs),
    /// Render PDF summaries of the cleaned CSVs
    Report(JobArgs),
    /// Transform, then report
    Run(JobArgs),
    /// List the datasets and rules of the catalog
    Datasets,
}

#[derive(Args, Debug, Default)]
struct JobArgs {
    /// Print the job summaries as JSON instead of a table
    #[arg(long)]
    summary_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let catalog = load_catalog(cli.rules.as_deref())?;
    let config = EtlConfig::from_env();

    match cli.command {
        Command::Datasets => {
            println!("{}", catalog_table(&catalog));
            Ok(())
        }
        Command::Transform(args) => {
            let buckets = connect_buckets(&config, cli.local_root.as_deref()).await?;
            let transform = run_transform_job(&catalog, &config, &buckets).await;
            print_summaries(&[transform], &args)
        }
        Command::Report(args) => {
            let buckets = connect_buckets(&config, cli.local_root.as_deref()).await?;
            let report = run_report_job(&catalog, &config, &buckets).await;
            print_summaries(&[report], &args)
        }
        Command::Run(args) => {
            let buckets = connect_buckets(&config, cli.local_root.as_deref()).await?;
            let transform = run_transform_job(&catalog, &config, &buckets).await;
            let report = run_report_job(&catalog, &config, &buckets).await;
            print_summaries(&[transform, report], &args)
        }
    }
}

fn load_catalog(path: Option<&Path>) -> Result<Catalog> {
    match path {
        Some(path) => Catalog::from_path(path)
            .with_context(|| format!("failed to load rule catalog {}", path.display())),
        None => Catalog::builtin().context("built-in rule catalog is invalid"),
    }
}

async fn connect_buckets(config: &EtlConfig, local_root: Option<&Path>) -> Result<Buckets> {
    Ok(Buckets {
        raw: connect_bucket(&config.raw_bucket, local_root).await?,
        transformed: connect_bucket(&config.transformed_bucket, local_root).await?,
        reports: connect_bucket(&config.reports_bucket, local_root).await?,
    })
}

async fn connect_bucket(bucket: &str, local_root: Option<&Path>) -> Result<Arc<dyn BucketStore>> {
    match local_root {
        Some(root) => {
            let store = LocalBucketStore::new(root, bucket)
                .with_context(|| format!("failed to open local bucket {bucket}"))?;
            info!(bucket, root = %root.display(), "Using local bucket");
            Ok(Arc::new(store))
        }
        None => {
            let store = S3BucketStore::new(S3Config::from_env(bucket))
                .await
                .with_context(|| format!("failed to configure S3 bucket {bucket}"))?;
            Ok(Arc::new(store))
        }
    }
}

/// Per-dataset failures are reported, never turned into a failing exit status.
fn print_summaries(summaries: &[JobSummary], args: &JobArgs) -> Result<()> {
    if args.summary_json {
        println!("{}", serde_json::to_string_pretty(summaries)?);
    } else {
        println!("{}", summary_table(summaries));
    }
    Ok(())
}

fn summary_table(summaries: &[JobSummary]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Job", "Dataset", "Status", "Output", "Message"]);
    for summary in summaries {
        for entry in &summary.datasets {
            table.add_row(vec![
                format!("{:?}", summary.job).to_lowercase(),
                entry.dataset.clone(),
                format!("{:?}", entry.status).to_lowercase(),
                entry.output_key.clone().unwrap_or_default(),
                entry.message.clone().unwrap_or_default(),
            ]);
        }
    }
    table
}

fn rule_description(rule: &CleaningRule) -> String {
    match rule {
        CleaningRule::CoerceNumeric { skip_leading } => {
            format!("coerce_numeric (skip {skip_leading})")
        }
        CleaningRule::Translate {
            label_column,
            value_translation,
            ..
        } => format!(
            "translate '{label_column}' ({} values)",
            value_translation.len()
        ),
        CleaningRule::Melt {
            id_column,
            variable_column,
            value_column,
        } => format!("melt '{id_column}' -> '{variable_column}' / '{value_column}'"),
    }
}

fn catalog_table(catalog: &Catalog) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Job", "Dataset", "Rule"]);

    for dataset in catalog.transform_datasets() {
        let rule = catalog
            .cleaning_rule(&dataset)
            .map(rule_description)
            .unwrap_or_else(|| "(none, skipped)".to_string());
        table.add_row(vec!["transform".to_string(), dataset, rule]);
    }
    for dataset in catalog.report_datasets() {
        let rule = catalog
            .report_rule(&dataset)
            .map(|rule| format!("{} ({} pages)", rule.document, rule.pages.len()))
            .unwrap_or_else(|| "(none, skipped)".to_string());
        table.add_row(vec!["report".to_string(), dataset, rule]);
    }
    table
}
