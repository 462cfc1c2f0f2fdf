//! Turns page tables into plot-ready series. Every grouping keeps the order in
//! which its labels first appear in the table.

use polars::prelude::*;

use crate::error::{EtlError, Result};
use crate::table::{is_text, require_column, require_numeric, string_cells};

/// Distinct labels in first-appearance order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Labels(Vec<String>);

impl Labels {
    pub fn index_of(&mut self, label: &str) -> usize {
        match self.0.iter().position(|known| known == label) {
            Some(idx) => idx,
            None => {
                self.0.push(label.to_string());
                self.0.len() - 1
            }
        }
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.0.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineSeries {
    pub hue: Option<usize>,
    pub style: Option<usize>,
    /// Mean y per distinct x, sorted by x.
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineData {
    pub series: Vec<LineSeries>,
    pub hues: Labels,
    pub styles: Labels,
    pub integer_x: bool,
}

impl LineData {
    pub fn label(&self, series: &LineSeries) -> String {
        [
            series.hue.and_then(|idx| self.hues.get(idx)),
            series.style.and_then(|idx| self.styles.get(idx)),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ")
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.series.iter().flat_map(|series| series.points.iter().copied())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub category: usize,
    pub hue: usize,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarData {
    pub bars: Vec<Bar>,
    pub categories: Labels,
    /// Empty when the chart has no hue; every bar then uses hue 0.
    pub hues: Labels,
    /// Categories run down the y axis.
    pub horizontal: bool,
}

fn optional_cells(df: &DataFrame, name: &str, present: bool) -> Result<Option<Vec<Option<String>>>> {
    if !present {
        return Ok(None);
    }
    Ok(Some(string_cells(df.column(name)?)?))
}

fn all_present(names: &[&str]) -> Expr {
    names
        .iter()
        .fold(lit(true), |acc, name| acc.and(col(*name).is_not_null()))
}

/// One series per (hue, style) combination; rows missing x, y or a label are skipped.
pub fn line_data(
    df: &DataFrame,
    x: &str,
    y: &str,
    hue: Option<&str>,
    style: Option<&str>,
) -> Result<LineData> {
    let integer_x = require_numeric(df, x)?.dtype().is_integer();
    require_numeric(df, y)?;

    let mut selected = vec![
        col(x).cast(DataType::Float64).alias("x"),
        col(y).cast(DataType::Float64).alias("y"),
    ];
    let mut keys: Vec<&str> = Vec::new();
    for (alias, label) in [("hue", hue), ("style", style)] {
        if let Some(label) = label {
            require_column(df, label)?;
            selected.push(col(label).cast(DataType::String).alias(alias));
            keys.push(alias);
        }
    }
    let filter = all_present(&[&["x", "y"][..], &keys[..]].concat());
    keys.push("x");

    let grouped = df
        .clone()
        .lazy()
        .select(selected)
        .filter(filter)
        .group_by_stable(keys.iter().map(|key| col(*key)).collect::<Vec<_>>())
        .agg([col("y").mean()])
        .collect()?;

    let xs: Vec<Option<f64>> = grouped.column("x")?.f64()?.into_iter().collect();
    let ys: Vec<Option<f64>> = grouped.column("y")?.f64()?.into_iter().collect();
    let hue_cells = optional_cells(&grouped, "hue", hue.is_some())?;
    let style_cells = optional_cells(&grouped, "style", style.is_some())?;

    let mut hues = Labels::default();
    let mut styles = Labels::default();
    let mut series: Vec<LineSeries> = Vec::new();
    for row in 0..grouped.height() {
        let (Some(x), Some(y)) = (xs[row], ys[row]) else {
            continue;
        };
        if !x.is_finite() || !y.is_finite() {
            continue;
        }
        let hue = hue_cells
            .as_ref()
            .and_then(|cells| cells[row].as_deref())
            .map(|label| hues.index_of(label));
        let style = style_cells
            .as_ref()
            .and_then(|cells| cells[row].as_deref())
            .map(|label| styles.index_of(label));

        match series
            .iter_mut()
            .find(|known| known.hue == hue && known.style == style)
        {
            Some(known) => known.points.push((x, y)),
            None => series.push(LineSeries {
                hue,
                style,
                points: vec![(x, y)],
            }),
        }
    }
    for line in &mut series {
        line.points.sort_by(|a, b| a.0.total_cmp(&b.0));
    }

    Ok(LineData {
        series,
        hues,
        styles,
        integer_x,
    })
}

/// Mean value per (category, hue). A text `y` column puts categories on the y
/// axis. Numeric categories are sorted; text categories keep table order.
pub fn bar_data(df: &DataFrame, x: &str, y: &str, hue: Option<&str>) -> Result<BarData> {
    let horizontal = is_text(require_column(df, y)?);
    let (category, value) = if horizontal { (y, x) } else { (x, y) };
    let category_dtype = require_column(df, category)?.dtype();
    let sort_categories = category_dtype.is_integer() || category_dtype.is_float();
    if is_text(require_column(df, value)?) {
        return Err(EtlError::Render(format!(
            "bar chart needs a numeric column, but '{x}' and '{y}' are both text"
        )));
    }

    let mut selected = vec![
        col(category).cast(DataType::String).alias("category"),
        col(category).alias("order"),
        col(value).cast(DataType::Float64).alias("value"),
    ];
    let mut keys = vec!["category"];
    if let Some(hue) = hue {
        require_column(df, hue)?;
        selected.push(col(hue).cast(DataType::String).alias("hue"));
        keys.push("hue");
    }

    let mut grouped = df
        .clone()
        .lazy()
        .select(selected)
        .filter(all_present(&[&keys[..], &["value"][..]].concat()))
        .group_by_stable(keys.iter().map(|key| col(*key)).collect::<Vec<_>>())
        .agg([col("value").mean(), col("order").first()])
        .collect()?;

    // Hue order follows the table even when categories are re-sorted.
    let mut hues = Labels::default();
    if let Some(cells) = optional_cells(&grouped, "hue", hue.is_some())? {
        for label in cells.iter().flatten() {
            hues.index_of(label);
        }
    }
    if sort_categories {
        grouped = grouped.sort(
            ["order"],
            SortMultipleOptions::default().with_maintain_order(true),
        )?;
    }

    let category_cells = string_cells(grouped.column("category")?)?;
    let values: Vec<Option<f64>> = grouped.column("value")?.f64()?.into_iter().collect();
    let hue_cells = optional_cells(&grouped, "hue", hue.is_some())?;

    let mut categories = Labels::default();
    let mut bars = Vec::with_capacity(grouped.height());
    for row in 0..grouped.height() {
        let (Some(label), Some(value)) = (category_cells[row].as_deref(), values[row]) else {
            continue;
        };
        if !value.is_finite() {
            continue;
        }
        let hue = hue_cells
            .as_ref()
            .and_then(|cells| cells[row].as_deref())
            .map(|label| hues.index_of(label))
            .unwrap_or(0);
        bars.push(Bar {
            category: categories.index_of(label),
            hue,
            value,
        });
    }

    Ok(BarData {
        bars,
        categories,
        hues,
        horizontal,
    })
}
