//! The two batch jobs. Each walks its datasets in catalog order; a dataset
//! either persists one object or is recorded as failed, and the loop moves
//! on either way.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use eestat_bucket::{BucketStore, CSV_CONTENT_TYPE, PDF_CONTENT_TYPE};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::catalog::{Catalog, CleaningRule, ReportRule};
use crate::config::EtlConfig;
use crate::error::{EtlError, Result};
use crate::report::build_report;
use crate::table::{read_cleaned_csv, read_raw_csv, write_csv};
use crate::transform::apply_cleaning_rule;

/// The three storage locations: raw input, cleaned tables and reports.
#[derive(Clone)]
pub struct Buckets {
    pub raw: Arc<dyn BucketStore>,
    pub transformed: Arc<dyn BucketStore>,
    pub reports: Arc<dyn BucketStore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Transform,
    Report,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetStatus {
    Succeeded,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetReport {
    pub dataset: String,
    pub status: DatasetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
    /// blake3 of the persisted bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DatasetReport {
    fn succeeded(dataset: &str, persisted: Persisted) -> Self {
        Self {
            dataset: dataset.to_string(),
            status: DatasetStatus::Succeeded,
            output_key: Some(persisted.key),
            digest: Some(persisted.digest),
            message: None,
        }
    }

    fn skipped(dataset: &str, reason: &str) -> Self {
        Self {
            dataset: dataset.to_string(),
            status: DatasetStatus::Skipped,
            output_key: None,
            digest: None,
            message: Some(reason.to_string()),
        }
    }

    fn failed(dataset: &str, err: &EtlError) -> Self {
        Self {
            dataset: dataset.to_string(),
            status: DatasetStatus::Failed,
            output_key: None,
            digest: None,
            message: Some(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub job: JobKind,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub datasets: Vec<DatasetReport>,
}

impl JobSummary {
    fn start(job: JobKind) -> Self {
        let now = Utc::now();
        Self {
            job,
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            datasets: Vec::new(),
        }
    }

    fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        info!(
            job = ?self.job,
            run_id = %self.run_id,
            succeeded = self.succeeded(),
            skipped = self.skipped(),
            failed = self.failed(),
            "Job finished"
        );
        self
    }

    fn count(&self, status: DatasetStatus) -> usize {
        self.datasets
            .iter()
            .filter(|report| report.status == status)
            .count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(DatasetStatus::Succeeded)
    }

    pub fn skipped(&self) -> usize {
        self.count(DatasetStatus::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(DatasetStatus::Failed)
    }

    pub fn report(&self, dataset: &str) -> Option<&DatasetReport> {
        self.datasets.iter().find(|report| report.dataset == dataset)
    }
}

#[derive(Debug)]
struct Persisted {
    key: String,
    digest: String,
}

fn digest(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Raw CSVs in, cleaned CSVs out.
pub async fn run_transform_job(
    catalog: &Catalog,
    config: &EtlConfig,
    buckets: &Buckets,
) -> JobSummary {
    let mut summary = JobSummary::start(JobKind::Transform);
    info!(
        run_id = %summary.run_id,
        source = buckets.raw.bucket(),
        target = buckets.transformed.bucket(),
        "Starting transform job"
    );

    for dataset in catalog.transform_datasets() {
        let Some(rule) = catalog.cleaning_rule(&dataset) else {
            warn!(dataset = %dataset, "No cleaning rule for dataset, skipping");
            summary
                .datasets
                .push(DatasetReport::skipped(&dataset, "no cleaning rule"));
            continue;
        };

        let report = match transform_dataset(&dataset, rule, config, buckets).await {
            Ok(persisted) => {
                info!(
                    dataset = %dataset,
                    rule = rule.kind(),
                    key = %persisted.key,
                    digest = %persisted.digest,
                    "Dataset transformed"
                );
                DatasetReport::succeeded(&dataset, persisted)
            }
            Err(err) => {
                error!(dataset = %dataset, error = %err, "Dataset transform failed");
                DatasetReport::failed(&dataset, &err)
            }
        };
        summary.datasets.push(report);
    }

    summary.finish()
}

async fn transform_dataset(
    dataset: &str,
    rule: &CleaningRule,
    config: &EtlConfig,
    buckets: &Buckets,
) -> Result<Persisted> {
    let raw_bytes = buckets.raw.get_object(dataset).await?;
    let raw = read_raw_csv(&raw_bytes)?;
    let raw_rows = raw.height();

    let cleaned = apply_cleaning_rule(rule, raw)?;
    debug!(
        dataset,
        raw_rows,
        rows = cleaned.height(),
        columns = cleaned.width(),
        "Cleaning rule applied"
    );

    let bytes = Bytes::from(write_csv(&cleaned)?);
    let key = config.transformed_key(dataset);
    let digest = digest(&bytes);
    buckets
        .transformed
        .put_object(&key, bytes, CSV_CONTENT_TYPE)
        .await?;
    Ok(Persisted { key, digest })
}

/// Cleaned CSVs in, one PDF per dataset out.
pub async fn run_report_job(catalog: &Catalog, config: &EtlConfig, buckets: &Buckets) -> JobSummary {
    let mut summary = JobSummary::start(JobKind::Report);
    info!(
        run_id = %summary.run_id,
        source = buckets.transformed.bucket(),
        target = buckets.reports.bucket(),
        "Starting report job"
    );

    for dataset in catalog.report_datasets() {
        let Some(rule) = catalog.report_rule(&dataset) else {
            warn!(dataset = %dataset, "No report rule for dataset, skipping");
            summary
                .datasets
                .push(DatasetReport::skipped(&dataset, "no report rule"));
            continue;
        };

        let report = match report_dataset(&dataset, rule, config, buckets).await {
            Ok(persisted) => {
                info!(
                    dataset = %dataset,
                    pages = rule.pages.len(),
                    key = %persisted.key,
                    digest = %persisted.digest,
                    "Report generated"
                );
                DatasetReport::succeeded(&dataset, persisted)
            }
            Err(err) => {
                error!(dataset = %dataset, error = %err, "Report generation failed");
                DatasetReport::failed(&dataset, &err)
            }
        };
        summary.datasets.push(report);
    }

    summary.finish()
}

async fn report_dataset(
    dataset: &str,
    rule: &ReportRule,
    config: &EtlConfig,
    buckets: &Buckets,
) -> Result<Persisted> {
    let cleaned_bytes = buckets.transformed.get_object(dataset).await?;
    let cleaned = read_cleaned_csv(&cleaned_bytes)?;
    debug!(dataset, rows = cleaned.height(), "Cleaned table loaded");

    let document = build_report(rule, cleaned)?;
    let bytes = document.pdf_bytes().cloned().ok_or_else(|| {
        EtlError::Pdf(format!("document '{}' was not finalized", document.name()))
    })?;

    let local_path = write_local_copy(&config.report_dir, document.name(), &bytes).await?;
    debug!(dataset, path = %local_path.display(), "Report written locally");

    let key = config.report_key(document.name());
    let digest = digest(&bytes);
    buckets
        .reports
        .put_object(&key, bytes, PDF_CONTENT_TYPE)
        .await?;
    Ok(Persisted { key, digest })
}

async fn write_local_copy(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}
