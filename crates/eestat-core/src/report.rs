//! Report rules: reshape a cleaned table, aggregate per page and hand each
//! page's table to the chart renderer.

use polars::prelude::*;
use tracing::debug;

use crate::catalog::{GroupMean, PageSpec, PrepareStep, ReportRule};
use crate::chart;
use crate::document::ReportDocument;
use crate::error::{EtlError, Result};
use crate::table::{
    coerce_numeric_in_place, drop_helper_columns, is_string, is_text, melt, require_column,
};

pub fn prepare_table(steps: &[PrepareStep], cleaned: DataFrame) -> Result<DataFrame> {
    steps
        .iter()
        .try_fold(cleaned, |df, step| apply_prepare_step(step, df))
}

fn apply_prepare_step(step: &PrepareStep, df: DataFrame) -> Result<DataFrame> {
    match step {
        PrepareStep::DropHelperColumns => drop_helper_columns(df),
        PrepareStep::Melt {
            id,
            variable,
            value,
        } => {
            let mut long = melt(&df, id, variable, value)?;
            coerce_numeric_in_place(&mut long, value)?;
            Ok(long)
        }
        PrepareStep::Split {
            column,
            into,
            separator,
        } => split_column(df, column, into, separator),
        PrepareStep::CastInteger { column } => cast_integer(df, column),
    }
}

fn split_column(
    df: DataFrame,
    column: &str,
    into: &[String; 2],
    separator: &str,
) -> Result<DataFrame> {
    if separator.is_empty() {
        return Err(EtlError::Transform(format!(
            "cannot split '{column}' on an empty separator"
        )));
    }
    require_column(&df, column)?;

    // Split at the first separator only; a value without one keeps a null tail.
    let parts = col(column)
        .cast(DataType::String)
        .str()
        .splitn(lit(separator), 2);
    let split = df
        .lazy()
        .with_columns([
            parts
                .clone()
                .struct_()
                .field_by_name("field_0")
                .alias(into[0].as_str()),
            parts
                .struct_()
                .field_by_name("field_1")
                .alias(into[1].as_str()),
        ])
        .collect()?;
    Ok(split)
}

/// Strict integer cast: a missing or non-integral cell is an error.
fn cast_integer(mut df: DataFrame, column: &str) -> Result<DataFrame> {
    let floats = require_column(&df, column)?.cast(&DataType::Float64)?;
    let invalid = floats
        .f64()?
        .into_iter()
        .position(|value| !matches!(value, Some(v) if v.is_finite() && v.fract() == 0.0));
    if let Some(row) = invalid {
        return Err(EtlError::Transform(format!(
            "cannot cast '{column}' to integer: row {row} is missing or not integral"
        )));
    }

    df.with_column(floats.cast(&DataType::Int64)?)?;
    Ok(df)
}

/// Mean of `value` per group, groups in first-appearance order.
pub fn group_mean(df: &DataFrame, spec: &GroupMean) -> Result<DataFrame> {
    if spec.by.is_empty() {
        return Err(EtlError::Transform(
            "group_mean needs at least one grouping column".to_string(),
        ));
    }
    for key in &spec.by {
        require_column(df, key)?;
    }
    let values = require_column(df, &spec.value)?;
    if is_text(values) {
        return Err(EtlError::Transform(format!(
            "cannot average non-numeric column '{}'",
            spec.value
        )));
    }

    let mut input = df.clone();
    if is_string(values) {
        let empty = values.cast(&DataType::Float64)?;
        input.with_column(empty)?;
    }

    let keys: Vec<Expr> = spec.by.iter().map(|key| col(key.as_str())).collect();
    let aggregated = input
        .lazy()
        .group_by_stable(keys)
        .agg([col(spec.value.as_str()).mean()])
        .collect()?;
    Ok(aggregated)
}

pub fn page_table(page: &PageSpec, prepared: &DataFrame) -> Result<DataFrame> {
    match &page.group_mean {
        Some(spec) => group_mean(prepared, spec),
        None => Ok(prepared.clone()),
    }
}

/// Renders every page of `rule` into a finalized document, in rule order.
pub fn build_report(rule: &ReportRule, cleaned: DataFrame) -> Result<ReportDocument> {
    let prepared = prepare_table(&rule.prepare, cleaned)?;
    let mut document = ReportDocument::new(&rule.document);

    for page in &rule.pages {
        let table = page_table(page, &prepared)?;
        debug!(
            document = %rule.document,
            title = %page.chart.title,
            rows = table.height(),
            "rendering report page"
        );
        document.push_page(chart::render_chart(&page.chart, &table)?)?;
    }

    document.finalize()?;
    Ok(document)
}
