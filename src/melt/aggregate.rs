//! Aggregation of per-record mappings into one rectangular table

use crate::melt::types::{FlatMapping, RecordKey};
use indexmap::IndexSet;

/// Header plus rows, every row as wide as the header
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Names of the field columns, i.e. the headers after the key column
    pub fn field_columns(&self) -> &[String] {
        self.headers.get(1..).unwrap_or_default()
    }

    /// Cell for `column` in row `row`
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.headers.iter().position(|header| header == column)?;
        self.rows.get(row)?.get(index).map(String::as_str)
    }
}

/// Builds a table from records in the order they are given
///
/// Columns are the key column followed by every field name in first-seen
/// order; a record lacking a field gets an empty cell. A field named like
/// the key column is not given a column of its own, the key wins.
pub fn aggregate<'a, I>(key_column: &str, records: I) -> Table
where
    I: IntoIterator<Item = (&'a RecordKey, &'a FlatMapping)>,
{
    let records: Vec<(&RecordKey, &FlatMapping)> = records.into_iter().collect();

    let mut columns: IndexSet<&str> = IndexSet::new();
    columns.insert(key_column);
    for (_, fields) in &records {
        columns.extend(fields.keys().map(String::as_str));
    }

    let rows = records
        .iter()
        .map(|(key, fields)| {
            let mut row = Vec::with_capacity(columns.len());
            row.push(key.0.clone());
            row.extend(
                columns
                    .iter()
                    .skip(1)
                    .map(|column| fields.get(*column).cloned().unwrap_or_default()),
            );
            row
        })
        .collect();

    let headers = columns.iter().map(|column| column.to_string()).collect();

    Table { headers, rows }
}
