//! CSV <-> DataFrame conversion and the small column helpers shared by the
//! cleaning and report rules.
//!
//! Raw tables are read untyped: every column is a `String` column and empty
//! cells are null. Cleaned tables are read the same way and then every column
//! whose non-null cells all parse as numbers is typed.

use std::io::Cursor;

use csv::ReaderBuilder;
use polars::prelude::*;

use crate::error::{EtlError, Result};

const UNNAMED_PREFIX: &str = "Unnamed:";

/// Blank headers and exported index columns (`Unnamed: 0`) are helpers, not data.
pub fn is_helper_column(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.is_empty() || trimmed.starts_with(UNNAMED_PREFIX)
}

pub fn read_raw_csv(bytes: &[u8]) -> Result<DataFrame> {
    // Column names come from the header line; polars only supplies the cells.
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(bytes);
    let headers = normalize_headers(reader.headers()?.iter());

    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()?;
    df.set_column_names(headers.iter().map(String::as_str))?;
    Ok(df)
}

pub fn read_cleaned_csv(bytes: &[u8]) -> Result<DataFrame> {
    infer_numeric_columns(read_raw_csv(bytes)?)
}

pub fn write_csv(df: &DataFrame) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut frame = df.clone();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .finish(&mut frame)?;
    Ok(buffer)
}

/// Blank headers become `Unnamed: <index>`; repeated headers get a `.N` suffix.
fn normalize_headers<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for (idx, header) in raw.enumerate() {
        let base = if header.trim().is_empty() {
            format!("{UNNAMED_PREFIX} {idx}")
        } else {
            header.trim().to_string()
        };

        let mut candidate = base.clone();
        let mut suffix = 1;
        while seen.contains(&candidate) {
            candidate = format!("{base}.{suffix}");
            suffix += 1;
        }
        seen.push(candidate);
    }
    seen
}

pub fn is_string(column: &Column) -> bool {
    column.dtype() == &DataType::String
}

/// A string column holding at least one value. All-null string columns come
/// from header-only tables and count as empty numbers.
pub fn is_text(column: &Column) -> bool {
    is_string(column) && column.null_count() < column.len()
}

/// Best-effort numeric coercion: unparseable cells become null, no row is dropped.
/// `Int64` when every parsed cell is integral, `Float64` otherwise. Columns that
/// are not strings are returned unchanged, so coercion is idempotent.
pub fn coerce_numeric(column: &Column) -> Result<Column> {
    if !is_string(column) {
        return Ok(column.clone());
    }
    let floats = column.cast(&DataType::Float64)?;
    let integers = column.cast(&DataType::Int64)?;
    if integers.null_count() == floats.null_count() {
        Ok(integers)
    } else {
        Ok(floats)
    }
}

pub fn coerce_numeric_in_place(df: &mut DataFrame, name: &str) -> Result<()> {
    let coerced = coerce_numeric(require_column(df, name)?)?;
    df.with_column(coerced)?;
    Ok(())
}

/// Types a string column only when every non-null cell parses as a number.
fn infer_column(column: &Column) -> Result<Column> {
    if column.null_count() == column.len() {
        return Ok(column.clone());
    }
    let coerced = coerce_numeric(column)?;
    if coerced.null_count() == column.null_count() {
        Ok(coerced)
    } else {
        Ok(column.clone())
    }
}

pub fn infer_numeric_columns(df: DataFrame) -> Result<DataFrame> {
    let columns = df
        .get_columns()
        .iter()
        .map(|column| {
            if is_string(column) {
                infer_column(column)
            } else {
                Ok(column.clone())
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(DataFrame::new(columns)?)
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}

pub fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name).map_err(|_| EtlError::MissingColumn {
        column: name.to_string(),
        available: column_names(df),
    })
}

/// Like `require_column`, but a column of text is an error.
pub fn require_numeric<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    let column = require_column(df, name)?;
    if is_text(column) {
        return Err(EtlError::Transform(format!(
            "column '{name}' is not numeric"
        )));
    }
    Ok(column)
}

pub fn drop_helper_columns(df: DataFrame) -> Result<DataFrame> {
    let helpers: Vec<String> = column_names(&df)
        .into_iter()
        .filter(|name| is_helper_column(name))
        .collect();
    Ok(df.drop_many(helpers))
}

pub fn string_cells(column: &Column) -> Result<Vec<Option<String>>> {
    let as_strings = if is_string(column) {
        column.clone()
    } else {
        column.cast(&DataType::String)?
    };
    Ok(as_strings
        .str()?
        .into_iter()
        .map(|cell| cell.map(str::to_string))
        .collect())
}

/// Wide to long: every column other than `id` is stacked into `variable` /
/// `value`, one column after another.
pub fn melt(df: &DataFrame, id: &str, variable: &str, value: &str) -> Result<DataFrame> {
    require_column(df, id)?;
    let on: Vec<PlSmallStr> = df
        .get_column_names()
        .into_iter()
        .filter(|name| name.as_str() != id)
        .cloned()
        .collect();

    let mut long = df.unpivot(on, [id])?;
    long.rename("variable", variable.into())?;
    long.rename("value", value.into())?;
    Ok(long)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_read_keeps_everything_as_strings() {
        let df = read_raw_csv(b",Label,2020\n0,a,1.5\n1,b,\n").expect("read");

        assert_eq!(column_names(&df), vec!["Unnamed: 0", "Label", "2020"]);
        assert_eq!(df.height(), 2);
        for column in df.get_columns() {
            assert!(is_string(column));
        }
        let values = string_cells(df.column("2020").expect("column")).expect("cells");
        assert_eq!(values, vec![Some("1.5".to_string()), None]);
    }

    #[test]
    fn duplicate_headers_are_suffixed() {
        let df = read_raw_csv(b"a,a,,\n1,2,3,4\n").expect("read");
        assert_eq!(
            column_names(&df),
            vec!["a", "a.1", "Unnamed: 2", "Unnamed: 3"]
        );
    }

    #[test]
    fn rows_wider_than_header_are_rejected() {
        let result = read_raw_csv(b"a,b\n1,2,3\n");
        assert!(matches!(result, Err(EtlError::Polars(_))));
    }

    #[test]
    fn cleaned_read_infers_numeric_columns() {
        let df = read_cleaned_csv(b"Year,Total,Label\n2020,1.5,x\n2021,,y\n").expect("read");

        assert_eq!(df.column("Year").expect("Year").dtype(), &DataType::Int64);
        assert_eq!(df.column("Total").expect("Total").dtype(), &DataType::Float64);
        assert_eq!(df.column("Label").expect("Label").dtype(), &DataType::String);
    }

    #[test]
    fn coercion_nulls_unparseable_cells() {
        let column = Column::new("v".into(), vec![Some("1"), Some(".."), None, Some("2.5")]);
        let coerced = coerce_numeric(&column).expect("coerce");

        assert_eq!(coerced.dtype(), &DataType::Float64);
        let values: Vec<Option<f64>> = coerced.f64().expect("f64").into_iter().collect();
        assert_eq!(values, vec![Some(1.0), None, None, Some(2.5)]);
    }

    #[test]
    fn coercion_is_idempotent() {
        let column = Column::new("v".into(), vec![Some("10"), Some("x"), Some("-3")]);
        let once = coerce_numeric(&column).expect("first");
        let twice = coerce_numeric(&once).expect("second");

        assert_eq!(once.dtype(), &DataType::Int64);
        assert!(once.as_materialized_series().equals_missing(twice.as_materialized_series()));
    }

    #[test]
    fn melt_is_column_major() {
        let df = read_raw_csv(b"id,2019,2020\na,1,2\nb,3,4\n").expect("read");
        let long = melt(&df, "id", "Year", "Value").expect("melt");

        assert_eq!(long.height(), 4);
        let ids = string_cells(long.column("id").expect("id")).expect("ids");
        let years = string_cells(long.column("Year").expect("Year")).expect("years");
        assert_eq!(
            ids,
            vec![Some("a".into()), Some("b".into()), Some("a".into()), Some("b".into())]
        );
        assert_eq!(
            years,
            vec![
                Some("2019".into()),
                Some("2019".into()),
                Some("2020".into()),
                Some("2020".into())
            ]
        );
    }

    #[test]
    fn header_only_columns_read_as_empty_numbers() {
        let df = read_cleaned_csv(b"Year,Total\n").expect("read");
        let total = df.column("Total").expect("Total");

        assert!(!is_text(total));
        assert!(require_numeric(&df, "Total").is_ok());
        let text = read_cleaned_csv(b"Label\nx\n").expect("read");
        assert!(matches!(
            require_numeric(&text, "Label"),
            Err(EtlError::Transform(_))
        ));
    }

    #[test]
    fn written_csv_has_no_index_column() {
        let df = read_cleaned_csv(b"Year,Total\n2020,1.5\n").expect("read");
        let bytes = write_csv(&df).expect("write");
        let text = String::from_utf8(bytes).expect("utf8");
        assert!(text.starts_with("Year,Total\n2020,1.5"));
    }

    #[test]
    fn missing_columns_list_what_is_available() {
        let df = read_raw_csv(b"a,b\n1,2\n").expect("read");
        match require_column(&df, "c") {
            Err(EtlError::MissingColumn { column, available }) => {
                assert_eq!(column, "c");
                assert_eq!(available, vec!["a", "b"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
