use std::path::PathBuf;

pub const DEFAULT_RAW_BUCKET: &str = "estonia-bronze";
pub const DEFAULT_TRANSFORMED_BUCKET: &str = "estonia-silver";
pub const DEFAULT_REPORTS_BUCKET: &str = "estonia-gold";
pub const DEFAULT_TRANSFORMED_PREFIX: &str = "transformed_";
pub const DEFAULT_REPORT_PREFIX: &str = "summary_from ";

/// Storage locations and object naming shared by both jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtlConfig {
    /// Location A: raw CSV objects.
    pub raw_bucket: String,
    /// Location B: cleaned CSV objects.
    pub transformed_bucket: String,
    /// Location C: PDF reports.
    pub reports_bucket: String,
    pub transformed_prefix: String,
    pub report_prefix: String,
    /// Where report PDFs are written before upload.
    pub report_dir: PathBuf,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            raw_bucket: DEFAULT_RAW_BUCKET.to_string(),
            transformed_bucket: DEFAULT_TRANSFORMED_BUCKET.to_string(),
            reports_bucket: DEFAULT_REPORTS_BUCKET.to_string(),
            transformed_prefix: DEFAULT_TRANSFORMED_PREFIX.to_string(),
            report_prefix: DEFAULT_REPORT_PREFIX.to_string(),
            report_dir: std::env::temp_dir().join("eestat-reports"),
        }
    }
}

impl EtlConfig {
    /// Loads `.env` (if present) and overlays `EESTAT_*` variables on the defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let value = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            raw_bucket: value("EESTAT_RAW_BUCKET").unwrap_or(defaults.raw_bucket),
            transformed_bucket: value("EESTAT_TRANSFORMED_BUCKET")
                .unwrap_or(defaults.transformed_bucket),
            reports_bucket: value("EESTAT_REPORTS_BUCKET").unwrap_or(defaults.reports_bucket),
            transformed_prefix: lookup("EESTAT_TRANSFORMED_PREFIX")
                .unwrap_or(defaults.transformed_prefix),
            report_prefix: lookup("EESTAT_REPORT_PREFIX").unwrap_or(defaults.report_prefix),
            report_dir: value("EESTAT_REPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.report_dir),
        }
    }

    pub fn transformed_key(&self, dataset: &str) -> String {
        format!("{}{}", self.transformed_prefix, dataset)
    }

    pub fn report_key(&self, document: &str) -> String {
        format!("{}{}", self.report_prefix, document)
    }
}
