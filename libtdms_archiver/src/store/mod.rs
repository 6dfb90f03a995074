//! Persistent homes for tables.
//!
//! A [`TabularStore`] knows nothing about merging; it offers the primitive operations the
//! [`TableMerger`](crate::merger::TableMerger) composes. Each realization guarantees that
//! `create` and `append_column` either persist the whole column or nothing.
pub mod sheets;
pub mod workbook;

#[cfg(test)]
pub(crate) mod memory;

use std::path::Path;

use super::column::Column;
use super::config::{read_token, Config, StoreConfig};
use super::error::{MonitorError, StoreError};
use super::naming::TableId;
use sheets::{SheetsSession, SheetsStore};
use workbook::WorkbookStore;

pub trait TabularStore: Send + Sync {
    fn exists(&self, table: &TableId) -> Result<bool, StoreError>;

    /// Create a table holding only `column`. Fails if the table already exists.
    fn create(&self, table: &TableId, column: &Column) -> Result<(), StoreError>;

    /// All columns of an existing table, in order
    fn read_columns(&self, table: &TableId) -> Result<Vec<Column>, StoreError>;

    /// Add `column` to the right of the existing columns, leaving them untouched
    fn append_column(&self, table: &TableId, column: &Column) -> Result<(), StoreError>;

    fn list_tables(&self) -> Result<Vec<TableId>, StoreError>;

    /// Local file holding the whole store, if there is one
    fn export_path(&self) -> Option<&Path> {
        None
    }
}

impl<S: TabularStore + ?Sized> TabularStore for Box<S> {
    fn exists(&self, table: &TableId) -> Result<bool, StoreError> {
        (**self).exists(table)
    }

    fn create(&self, table: &TableId, column: &Column) -> Result<(), StoreError> {
        (**self).create(table, column)
    }

    fn read_columns(&self, table: &TableId) -> Result<Vec<Column>, StoreError> {
        (**self).read_columns(table)
    }

    fn append_column(&self, table: &TableId, column: &Column) -> Result<(), StoreError> {
        (**self).append_column(table, column)
    }

    fn list_tables(&self) -> Result<Vec<TableId>, StoreError> {
        (**self).list_tables()
    }

    fn export_path(&self) -> Option<&Path> {
        (**self).export_path()
    }
}

/// Build the store described by the config. Missing credentials are fatal here.
pub fn open_store(config: &Config) -> Result<Box<dyn TabularStore>, MonitorError> {
    match &config.store {
        StoreConfig::Workbook { path } => {
            spdlog::info!("Using local workbook {}", path.display());
            Ok(Box::new(WorkbookStore::new(path)))
        }
        StoreConfig::Sheets {
            spreadsheet_id,
            token_env,
            endpoint,
        } => {
            let token = read_token(token_env)?;
            let session = SheetsSession::connect(endpoint, spreadsheet_id, &token)?;
            spdlog::info!("Using remote spreadsheet {}", spreadsheet_id);
            Ok(Box::new(SheetsStore::new(session)))
        }
    }
}

/// Text stored in place of samples that spreadsheets cannot hold as numbers
pub(crate) fn non_finite_text(value: f64) -> &'static str {
    if value.is_nan() {
        "NaN"
    } else if value.is_sign_positive() {
        "inf"
    } else {
        "-inf"
    }
}

/// Parse a sample written as text, accepting the forms produced by [`non_finite_text`]
pub(crate) fn parse_sample_text(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_finite_text_round_trip() {
        for value in [f64::INFINITY, f64::NEG_INFINITY] {
            assert_eq!(parse_sample_text(non_finite_text(value)), Some(value));
        }
        assert!(parse_sample_text(non_finite_text(f64::NAN)).unwrap().is_nan());
        assert_eq!(parse_sample_text(" 1.25 "), Some(1.25));
        assert_eq!(parse_sample_text("abc"), None);
    }
}
