// crates/eestat-core/src/error.rs

use eestat_bucket::BucketError;
use plotters::drawing::DrawingAreaErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Object storage error: {0}")]
    Bucket(#[from] BucketError),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Catalog is invalid: {0}")]
    Catalog(String),

    #[error("Catalog TOML could not be parsed: {0}")]
    CatalogToml(#[from] toml::de::Error),

    #[error("Column '{column}' not found (available: {available:?})")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("Transform failed: {0}")]
    Transform(String),

    #[error("Chart rendering failed: {0}")]
    Render(String),

    #[error("PDF generation failed: {0}")]
    Pdf(String),
}

pub type Result<T> = std::result::Result<T, EtlError>;

impl<E> From<DrawingAreaErrorKind<E>> for EtlError
where
    E: std::error::Error + Send + Sync,
{
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        EtlError::Render(err.to_string())
    }
}
