pub mod catalog;
pub mod chart;
pub mod config;
pub mod document;
pub mod error;
pub mod jobs;
pub mod report;
pub mod table;
pub mod transform;

pub use catalog::Catalog;
pub use config::EtlConfig;
pub use error::{EtlError, Result};
pub use jobs::{run_report_job, run_transform_job, Buckets, DatasetReport, DatasetStatus, JobSummary};
