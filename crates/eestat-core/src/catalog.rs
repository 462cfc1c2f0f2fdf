//! Data-driven dispatch: which cleaning rule and which report rule apply to
//! which dataset, plus the order each job walks its datasets in.
//!
//! The catalog is TOML. A default catalog describing the four Statistics
//! Estonia datasets is compiled into the crate; `--rules` swaps in another.

use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{EtlError, Result};

const BUILTIN_CATALOG: &str = include_str!("../catalog/default.toml");

static BUILTIN: Lazy<std::result::Result<Catalog, String>> =
    Lazy::new(|| Catalog::from_toml_str(BUILTIN_CATALOG).map_err(|err| err.to_string()));

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Translation {
    pub from: String,
    pub to: String,
}

/// Ordered string lookup used for cell values (whole-value match) and
/// headers (substring replacement, entries applied in order).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TranslationTable(pub Vec<Translation>);

impl TranslationTable {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(from, to)| Translation {
                    from: from.to_string(),
                    to: to.to_string(),
                })
                .collect(),
        )
    }

    /// Exact-match lookup; unknown values map to themselves.
    pub fn lookup<'a>(&'a self, value: &'a str) -> &'a str {
        self.0
            .iter()
            .find(|entry| entry.from == value)
            .map(|entry| entry.to.as_str())
            .unwrap_or(value)
    }

    pub fn replace_substrings(&self, value: &str) -> String {
        self.0
            .iter()
            .filter(|entry| !entry.from.is_empty())
            .fold(value.to_string(), |acc, entry| {
                acc.replace(&entry.from, &entry.to)
            })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CleaningRule {
    /// Coerce every column after the first `skip_leading` to numeric.
    CoerceNumeric { skip_leading: usize },
    /// Rename the label column and translate its values and the headers.
    Translate {
        label_column: String,
        #[serde(default)]
        value_translation: TranslationTable,
        #[serde(default)]
        header_translation: TranslationTable,
    },
    /// Wide to long, then numeric coercion and dropping rows without a value.
    Melt {
        id_column: String,
        variable_column: String,
        value_column: String,
    },
}

impl CleaningRule {
    pub fn kind(&self) -> &'static str {
        match self {
            CleaningRule::CoerceNumeric { .. } => "coerce_numeric",
            CleaningRule::Translate { .. } => "translate",
            CleaningRule::Melt { .. } => "melt",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CleaningRuleEntry {
    pub dataset: String,
    #[serde(flatten)]
    pub rule: CleaningRule,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PrepareStep {
    DropHelperColumns,
    /// Wide to long; the value column is coerced to numeric, nothing is dropped.
    Melt {
        id: String,
        variable: String,
        value: String,
    },
    /// Splits `column` at the first `separator` into two new columns.
    Split {
        column: String,
        into: [String; 2],
        #[serde(default = "default_separator")]
        separator: String,
    },
    CastInteger { column: String },
}

fn default_separator() -> String {
    " ".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GroupMean {
    pub by: Vec<String>,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Line,
    Bar,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub kind: ChartKind,
    pub x: String,
    pub y: String,
    #[serde(default)]
    pub hue: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PageSpec {
    #[serde(default)]
    pub group_mean: Option<GroupMean>,
    #[serde(flatten)]
    pub chart: ChartSpec,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReportRule {
    /// Cleaned object name this rule reads.
    pub dataset: String,
    /// File name of the produced PDF.
    pub document: String,
    #[serde(default)]
    pub prepare: Vec<PrepareStep>,
    #[serde(default)]
    pub pages: Vec<PageSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TransformSection {
    #[serde(default)]
    pub datasets: Vec<String>,
    #[serde(default)]
    pub rules: Vec<CleaningRuleEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ReportSection {
    #[serde(default)]
    pub datasets: Vec<String>,
    #[serde(default)]
    pub rules: Vec<ReportRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Catalog {
    #[serde(default)]
    pub transform: TransformSection,
    #[serde(default)]
    pub report: ReportSection,
}

impl Catalog {
    /// The compiled-in catalog, parsed once per process.
    pub fn builtin() -> Result<Self> {
        BUILTIN.clone().map_err(EtlError::Catalog)
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let catalog: Catalog = toml::from_str(source)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.transform.rules {
            if !seen.insert(entry.dataset.as_str()) {
                return Err(EtlError::Catalog(format!(
                    "duplicate cleaning rule for '{}'",
                    entry.dataset
                )));
            }
            if let CleaningRule::Melt {
                id_column,
                variable_column,
                value_column,
            } = &entry.rule
            {
                let names: HashSet<&str> = [id_column, variable_column, value_column]
                    .into_iter()
                    .map(String::as_str)
                    .collect();
                if names.len() != 3 {
                    return Err(EtlError::Catalog(format!(
                        "melt rule for '{}' needs three distinct column names",
                        entry.dataset
                    )));
                }
            }
        }

        let mut seen = HashSet::new();
        for rule in &self.report.rules {
            if !seen.insert(rule.dataset.as_str()) {
                return Err(EtlError::Catalog(format!(
                    "duplicate report rule for '{}'",
                    rule.dataset
                )));
            }
            if rule.document.trim().is_empty() {
                return Err(EtlError::Catalog(format!(
                    "report rule for '{}' has no document name",
                    rule.dataset
                )));
            }
        }
        Ok(())
    }

    pub fn cleaning_rule(&self, dataset: &str) -> Option<&CleaningRule> {
        self.transform
            .rules
            .iter()
            .find(|entry| entry.dataset == dataset)
            .map(|entry| &entry.rule)
    }

    pub fn report_rule(&self, dataset: &str) -> Option<&ReportRule> {
        self.report.rules.iter().find(|rule| rule.dataset == dataset)
    }

    /// Raw dataset names in processing order; defaults to rule order.
    pub fn transform_datasets(&self) -> Vec<String> {
        if self.transform.datasets.is_empty() {
            self.transform
                .rules
                .iter()
                .map(|entry| entry.dataset.clone())
                .collect()
        } else {
            self.transform.datasets.clone()
        }
    }

    /// Cleaned dataset names in processing order; defaults to rule order.
    pub fn report_datasets(&self) -> Vec<String> {
        if self.report.datasets.is_empty() {
            self.report
                .rules
                .iter()
                .map(|rule| rule.dataset.clone())
                .collect()
        } else {
            self.report.datasets.clone()
        }
    }
}
