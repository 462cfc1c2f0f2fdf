//! Cleaning rules: raw table in, cleaned table out. Every rule is a pure
//! function of its input; nothing here touches storage.

use polars::prelude::*;

use crate::catalog::{CleaningRule, TranslationTable};
use crate::error::{EtlError, Result};
use crate::table::{
    coerce_numeric, coerce_numeric_in_place, column_names, drop_helper_columns, melt,
    require_column, string_cells,
};

pub fn apply_cleaning_rule(rule: &CleaningRule, raw: DataFrame) -> Result<DataFrame> {
    match rule {
        CleaningRule::CoerceNumeric { skip_leading } => coerce_trailing_columns(raw, *skip_leading),
        CleaningRule::Translate {
            label_column,
            value_translation,
            header_translation,
        } => translate(raw, label_column, value_translation, header_translation),
        CleaningRule::Melt {
            id_column,
            variable_column,
            value_column,
        } => melt_and_coerce(raw, id_column, variable_column, value_column),
    }
}

fn coerce_trailing_columns(raw: DataFrame, skip_leading: usize) -> Result<DataFrame> {
    let columns = raw
        .get_columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            if idx < skip_leading {
                Ok(column.clone())
            } else {
                coerce_numeric(column)
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(DataFrame::new(columns)?)
}

fn translate(
    raw: DataFrame,
    label_column: &str,
    values: &TranslationTable,
    headers: &TranslationTable,
) -> Result<DataFrame> {
    let mut df = drop_helper_columns(raw)?;
    let Some(first) = column_names(&df).into_iter().next() else {
        return Err(EtlError::Transform(
            "table has no data columns to label".to_string(),
        ));
    };
    if first != label_column {
        if df.column(label_column).is_ok() {
            return Err(EtlError::Transform(format!(
                "cannot rename '{first}' to '{label_column}': column already exists"
            )));
        }
        df.rename(&first, label_column.into())?;
    }

    let labels = require_column(&df, label_column)?;
    let translated: Vec<Option<String>> = string_cells(labels)?
        .into_iter()
        .map(|cell| cell.map(|value| values.lookup(&value).to_string()))
        .collect();
    df.with_column(Column::new(label_column.into(), translated))?;

    for name in column_names(&df) {
        let renamed = headers.replace_substrings(&name);
        if renamed != name {
            df.rename(&name, renamed.into())?;
        }
    }
    Ok(df)
}

fn melt_and_coerce(
    raw: DataFrame,
    id_column: &str,
    variable_column: &str,
    value_column: &str,
) -> Result<DataFrame> {
    let wide = drop_helper_columns(raw)?;
    let mut long = melt(&wide, id_column, variable_column, value_column)?;

    coerce_numeric_in_place(&mut long, variable_column)?;
    coerce_numeric_in_place(&mut long, value_column)?;

    let present = require_column(&long, value_column)?.is_not_null();
    Ok(long.filter(&present)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::read_raw_csv;

    #[test]
    fn coerce_numeric_leaves_leading_columns_alone() {
        let raw = read_raw_csv(b"Year,Total,Food\n2020,1.5,x\n2021,..,3\n").expect("read");
        let cleaned =
            apply_cleaning_rule(&CleaningRule::CoerceNumeric { skip_leading: 1 }, raw)
                .expect("clean");

        assert_eq!(cleaned.height(), 2);
        assert_eq!(cleaned.column("Year").expect("Year").dtype(), &DataType::String);
        let total: Vec<Option<f64>> = cleaned
            .column("Total")
            .expect("Total")
            .f64()
            .expect("f64")
            .into_iter()
            .collect();
        assert_eq!(total, vec![Some(1.5), None]);
        let food: Vec<Option<i64>> = cleaned
            .column("Food")
            .expect("Food")
            .i64()
            .expect("i64")
            .into_iter()
            .collect();
        assert_eq!(food, vec![None, Some(3)]);
    }

    #[test]
    fn skip_beyond_width_is_a_no_op() {
        let raw = read_raw_csv(b"a,b\n1,2\n").expect("read");
        let cleaned =
            apply_cleaning_rule(&CleaningRule::CoerceNumeric { skip_leading: 5 }, raw.clone())
                .expect("clean");
        assert!(cleaned.equals_missing(&raw));
    }

    #[test]
    fn melt_rule_drops_rows_without_values() {
        let raw = read_raw_csv(
            b",Type and level of education,2019,2020,2021\n\
              0,Primary,10,11,\n\
              1,Secondary,20,..,22\n",
        )
        .expect("read");
        let rule = CleaningRule::Melt {
            id_column: "Type and level of education".into(),
            variable_column: "Year".into(),
            value_column: "People Count".into(),
        };
        let cleaned = apply_cleaning_rule(&rule, raw).expect("clean");

        // 2 entities x 3 periods minus 2 missing values.
        assert_eq!(cleaned.height(), 4);
        assert_eq!(
            column_names(&cleaned),
            vec!["Type and level of education", "Year", "People Count"]
        );
        assert_eq!(cleaned.column("Year").expect("Year").dtype(), &DataType::Int64);
        let years: Vec<Option<i64>> = cleaned
            .column("Year")
            .expect("Year")
            .i64()
            .expect("i64")
            .into_iter()
            .collect();
        assert_eq!(years, vec![Some(2019), Some(2019), Some(2020), Some(2021)]);
    }

    #[test]
    fn melt_rule_requires_the_id_column() {
        let raw = read_raw_csv(b"Label,2020\na,1\n").expect("read");
        let rule = CleaningRule::Melt {
            id_column: "Type and level of education".into(),
            variable_column: "Year".into(),
            value_column: "People Count".into(),
        };
        assert!(matches!(
            apply_cleaning_rule(&rule, raw),
            Err(EtlError::MissingColumn { .. })
        ));
    }

    fn income_rule() -> CleaningRule {
        CleaningRule::Translate {
            label_column: "Income source".into(),
            value_translation: TranslationTable::from_pairs([
                ("Sissetulek palgatööst", "Income from paid work"),
                ("Siirded", "Transfers"),
            ]),
            header_translation: TranslationTable::from_pairs([
                ("Mehed ja naised", "Males and Females"),
                ("Mehed", "Males"),
                ("Naised", "Females"),
            ]),
        }
    }

    #[test]
    fn translate_rule_relabels_values_and_headers() {
        let raw = read_raw_csv(
            ",Sissetulekuallikas,2020 Mehed,2020 Naised\n0,Sissetulek palgatööst,1200,1100\n"
                .as_bytes(),
        )
        .expect("read");
        let cleaned = apply_cleaning_rule(&income_rule(), raw).expect("clean");

        assert_eq!(
            column_names(&cleaned),
            vec!["Income source", "2020 Males", "2020 Females"]
        );
        let labels = string_cells(cleaned.column("Income source").expect("label")).expect("cells");
        assert_eq!(labels, vec![Some("Income from paid work".to_string())]);
    }

    #[test]
    fn translate_rule_keeps_unknown_labels() {
        let raw = read_raw_csv("Allikas,2021 Mehed ja naised\nMuu,5\n".as_bytes()).expect("read");
        let cleaned = apply_cleaning_rule(&income_rule(), raw).expect("clean");

        assert_eq!(
            column_names(&cleaned),
            vec!["Income source", "2021 Males and Females"]
        );
        let labels = string_cells(cleaned.column("Income source").expect("label")).expect("cells");
        assert_eq!(labels, vec![Some("Muu".to_string())]);
    }

    #[test]
    fn translate_rule_needs_a_data_column() {
        let raw = read_raw_csv(b",\n0,\n").expect("read");
        assert!(matches!(
            apply_cleaning_rule(&income_rule(), raw),
            Err(EtlError::Transform(_))
        ));
    }
}
