use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::amount::THOUSANDS_SEPARATOR;
use crate::errors::SamplerError;
use crate::types::{ColumnName, RowIndex};

/// A single scalar cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    /// Empty field.
    Null,
    /// Field that parsed as a number. `raw` is the trimmed source text and is
    /// what gets written back out.
    Number {
        /// Parsed value.
        value: f64,
        /// Trimmed source text.
        raw: String,
    },
    /// Any other field, trimmed.
    Text(String),
}

impl CellValue {
    /// Classify a raw delimited field.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Null;
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => CellValue::Number {
                value,
                raw: trimmed.to_string(),
            },
            _ => CellValue::Text(trimmed.to_string()),
        }
    }

    /// Number cell whose text is the shortest rendering of `value`.
    pub fn number(value: f64) -> Self {
        CellValue::Number {
            value,
            raw: value.to_string(),
        }
    }

    /// Grouping identity for distinct-value rules; `None` for nulls.
    pub fn key(&self) -> Option<ValueKey> {
        match self {
            CellValue::Null => None,
            CellValue::Number { value, .. } => Some(ValueKey::number(*value)),
            CellValue::Text(text) => Some(ValueKey::Text(text.clone())),
        }
    }

    /// Absolute numeric magnitude, accepting `,` thousands separators in text.
    pub fn magnitude(&self) -> Option<f64> {
        match self {
            CellValue::Null => None,
            CellValue::Number { value, .. } => Some(value.abs()),
            CellValue::Text(text) => {
                let cleaned: String = text
                    .chars()
                    .filter(|ch| *ch != THOUSANDS_SEPARATOR)
                    .collect();
                cleaned
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite())
                    .map(f64::abs)
            }
        }
    }

    /// Delimited-field rendering: the source text, or empty for nulls.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Number { raw, .. } => f.write_str(raw),
            CellValue::Text(text) => f.write_str(text),
        }
    }
}

/// Hashable identity of a non-null cell.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKey {
    /// Bit pattern of a finite number (`-0.0` folded into `0.0`).
    Number(u64),
    /// Exact text.
    Text(String),
}

impl ValueKey {
    fn number(value: f64) -> Self {
        let folded = if value == 0.0 { 0.0 } else { value };
        ValueKey::Number(folded.to_bits())
    }
}

/// In-memory table of rows with positional identity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RowTable {
    columns: Vec<ColumnName>,
    rows: Vec<Vec<CellValue>>,
}

impl RowTable {
    /// Create an empty table with the given header.
    pub fn new<I, C>(columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ColumnName>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row; short rows are padded with nulls, long rows are rejected.
    pub fn push_row(&mut self, mut cells: Vec<CellValue>) -> Result<RowIndex, SamplerError> {
        if cells.len() > self.columns.len() {
            return Err(SamplerError::Configuration(format!(
                "row {} has {} fields but the header has {}",
                self.rows.len(),
                cells.len(),
                self.columns.len()
            )));
        }
        cells.resize(self.columns.len(), CellValue::Null);
        self.rows.push(cells);
        Ok(self.rows.len() - 1)
    }

    /// Convenience for building tables from raw text fields.
    pub fn push_raw_row<I, S>(&mut self, fields: I) -> Result<RowIndex, SamplerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cells = fields
            .into_iter()
            .map(|field| CellValue::parse(field.as_ref()))
            .collect();
        self.push_row(cells)
    }

    /// Header names in source order.
    pub fn columns(&self) -> &[ColumnName] {
        &self.columns
    }

    /// Position of `name` in the header.
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cells of row `index`.
    pub fn row(&self, index: RowIndex) -> Option<&[CellValue]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Cell at (`index`, `column`).
    pub fn cell(&self, index: RowIndex, column: usize) -> Option<&CellValue> {
        self.rows.get(index).and_then(|row| row.get(column))
    }

    /// Row indices grouped by distinct non-null value, in first-appearance order.
    pub fn group_by_value(&self, column: usize) -> IndexMap<ValueKey, Vec<RowIndex>> {
        let mut groups: IndexMap<ValueKey, Vec<RowIndex>> = IndexMap::new();
        for (index, row) in self.rows.iter().enumerate() {
            if let Some(key) = row.get(column).and_then(CellValue::key) {
                groups.entry(key).or_default().push(index);
            }
        }
        groups
    }

    /// Rewrite negative or separator-formatted amounts of `column` to their
    /// absolute value and return every row's magnitude (0.0 for null or
    /// non-numeric cells). Non-negative number cells keep their source text.
    pub fn normalize_amounts(&mut self, column: usize) -> Vec<f64> {
        self.rows
            .iter_mut()
            .map(|row| match row.get_mut(column) {
                Some(cell) => match cell.magnitude() {
                    Some(value) => {
                        let keeps_text = matches!(
                            cell,
                            CellValue::Number { value, .. } if !value.is_sign_negative()
                        );
                        if !keeps_text {
                            *cell = CellValue::number(value);
                        }
                        value
                    }
                    None => 0.0,
                },
                None => 0.0,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RowTable {
        let mut table = RowTable::new(["Branch", "Amount"]);
        table.push_raw_row(["North", "-1,250.50"]).unwrap();
        table.push_raw_row(["South", "300.00"]).unwrap();
        table.push_raw_row(["North", ""]).unwrap();
        table.push_raw_row(["", "n/a"]).unwrap();
        table
    }

    #[test]
    fn cells_classify_null_number_and_text() {
        assert_eq!(CellValue::parse("  "), CellValue::Null);
        assert_eq!(CellValue::parse("-4.5"), CellValue::number(-4.5));
        assert!(matches!(
            CellValue::parse("12.50"),
            CellValue::Number { value, .. } if value == 12.5
        ));
        assert_eq!(CellValue::parse(" North "), CellValue::Text("North".into()));
        assert_eq!(CellValue::parse("NaN"), CellValue::Text("NaN".into()));
        assert_eq!(CellValue::number(12.0).render(), "12");
        assert_eq!(CellValue::Null.render(), "");
    }

    #[test]
    fn numeric_cells_render_their_source_text() {
        for raw in ["00012", "12.50", "12345678901234567891", "1e3", "+7"] {
            let cell = CellValue::parse(raw);
            assert!(matches!(cell, CellValue::Number { .. }), "{raw}");
            assert_eq!(cell.render(), raw);
        }
        assert_eq!(CellValue::parse("00012").key(), CellValue::parse("12").key());
    }

    #[test]
    fn negative_zero_shares_a_key_with_zero() {
        assert_eq!(
            CellValue::parse("-0.0").key(),
            CellValue::parse("0").key()
        );
        assert_ne!(
            CellValue::parse("1.0").key(),
            CellValue::Text("1".into()).key()
        );
    }

    #[test]
    fn grouping_skips_nulls_and_keeps_first_appearance_order() {
        let table = table();
        let groups = table.group_by_value(0);
        let keys: Vec<_> = groups.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                ValueKey::Text("North".into()),
                ValueKey::Text("South".into())
            ]
        );
        assert_eq!(groups[&ValueKey::Text("North".into())], vec![0, 2]);
    }

    #[test]
    fn amount_normalization_is_absolute_and_tolerates_junk() {
        let mut table = table();
        let amounts = table.normalize_amounts(1);
        assert_eq!(amounts, vec![1250.5, 300.0, 0.0, 0.0]);
        assert_eq!(table.cell(0, 1), Some(&CellValue::number(1250.5)));
        assert_eq!(table.cell(0, 1).map(CellValue::render).as_deref(), Some("1250.5"));
        assert_eq!(table.cell(1, 1).map(CellValue::render).as_deref(), Some("300.00"));
        assert_eq!(table.cell(3, 1), Some(&CellValue::Text("n/a".into())));
    }

    #[test]
    fn push_row_pads_short_rows_and_rejects_long_ones() {
        let mut table = RowTable::new(["a", "b"]);
        let index = table.push_raw_row(["x"]).unwrap();
        assert_eq!(table.row(index), Some(&[CellValue::Text("x".into()), CellValue::Null][..]));
        assert!(table.push_raw_row(["1", "2", "3"]).is_err());
        assert_eq!(table.len(), 1);
    }
}
