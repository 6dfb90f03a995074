use time::OffsetDateTime;

use super::naming::{column_name, TableId};

/// A named sequence of samples. Columns are ragged: nothing aligns them to other columns
/// beyond the row (sample) index.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

impl Column {
    pub fn new(name: &str, values: Vec<f64>) -> Self {
        Self {
            name: name.to_string(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bitwise comparison of the samples, ignoring the name. NaN compares equal to itself.
    pub fn same_values(&self, other: &Column) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(other.values.iter())
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

/// Wrap an extracted sample sequence into a column named for the ingestion time.
///
/// The recording's logical name is absent: it selects the table, not the column.
pub fn build_column(samples: Vec<f64>, prefix: &str, now: OffsetDateTime) -> Column {
    Column {
        name: column_name(prefix, now),
        values: samples,
    }
}

/// The wide table for one logical source, columns in merge order
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub id: TableId,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(id: TableId, columns: Vec<Column>) -> Self {
        Self { id, columns }
    }

    /// Number of rows needed to hold the longest column
    pub fn n_rows(&self) -> usize {
        self.columns.iter().map(|c| c.len()).max().unwrap_or(0)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}
