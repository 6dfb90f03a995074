use calamine::{open_workbook_auto, Data, Range, Reader};
use rust_xlsxwriter::{Workbook, Worksheet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::{non_finite_text, parse_sample_text, TabularStore};
use crate::column::{Column, Table};
use crate::error::StoreError;
use crate::naming::TableId;
use crate::tracker::temporary_sibling;

const MAX_SHEET_NAME_LENGTH: usize = 31;
const FORBIDDEN_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];
// Excel's sheet limits
const MAX_COLUMNS: usize = 16_384;
const MAX_ROWS: usize = 1_048_576;

/// One sheet of the workbook
#[derive(Debug)]
enum Sheet {
    Table(Table),
    /// A sheet whose name is not a table id. Its cell values are written back as read.
    Foreign { name: String, cells: Range<Data> },
}

impl Sheet {
    fn name(&self) -> &str {
        match self {
            Self::Table(table) => table.id.as_str(),
            Self::Foreign { name, .. } => name,
        }
    }

    fn table(&self) -> Option<&Table> {
        match self {
            Self::Table(table) => Some(table),
            Self::Foreign { .. } => None,
        }
    }

    fn table_mut(&mut self) -> Option<&mut Table> {
        match self {
            Self::Table(table) => Some(table),
            Self::Foreign { .. } => None,
        }
    }
}

/// A local .xlsx workbook with one sheet per table.
///
/// Row 0 of every sheet holds the column names, samples start at row 1 and each column ends at
/// its first empty cell. Any write rewrites the whole workbook into a temporary sibling and
/// renames it over the existing file, so a failure leaves the previous workbook in place. Writes are
/// serialized across tables because they all land in the same file.
///
/// Sheets whose name is not a valid table id are carried through every rewrite with their cell
/// values; their formatting and formulas are not kept.
#[derive(Debug)]
pub struct WorkbookStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl WorkbookStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Read every sheet. A missing workbook is an empty store.
    fn load(&self) -> Result<Vec<Sheet>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut workbook = open_workbook_auto(&self.path)?;
        let names: Vec<String> = workbook.sheet_names().to_vec();
        let mut sheets = Vec::with_capacity(names.len());
        for name in names {
            let range = workbook.worksheet_range(&name)?;
            match TableId::new(&name) {
                Ok(id) if id.as_str() == name => {
                    let columns = read_sheet_columns(&name, &range)?;
                    sheets.push(Sheet::Table(Table::new(id, columns)));
                }
                _ => {
                    spdlog::debug!(
                        "Sheet {:?} in {} is not a table; keeping it as is",
                        name,
                        self.path.display()
                    );
                    sheets.push(Sheet::Foreign { name, cells: range });
                }
            }
        }
        Ok(sheets)
    }

    fn load_tables(&self) -> Result<Vec<Table>, StoreError> {
        Ok(self
            .load()?
            .into_iter()
            .filter_map(|sheet| match sheet {
                Sheet::Table(table) => Some(table),
                Sheet::Foreign { .. } => None,
            })
            .collect())
    }

    fn save(&self, sheets: &[Sheet]) -> Result<(), StoreError> {
        let mut workbook = Workbook::new();
        for sheet in sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(sheet.name())?;
            match sheet {
                Sheet::Table(table) => write_table(worksheet, table)?,
                Sheet::Foreign { cells, .. } => write_cells(worksheet, cells)?,
            }
        }

        let tmp_path = temporary_sibling(&self.path);
        if let Err(e) = workbook.save(&tmp_path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(StoreError::WorkbookWrite(e));
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Read-modify-write of the whole workbook under the write lock
    fn modify<F>(&self, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Vec<Sheet>) -> Result<(), StoreError>,
    {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut sheets = self.load()?;
        change(&mut sheets)?;
        self.save(&sheets)
    }
}

impl TabularStore for WorkbookStore {
    fn exists(&self, table: &TableId) -> Result<bool, StoreError> {
        Ok(self.load_tables()?.iter().any(|t| &t.id == table))
    }

    fn create(&self, table: &TableId, column: &Column) -> Result<(), StoreError> {
        check_column_fits(table, column)?;
        self.modify(|sheets| {
            if sheets.iter().filter_map(Sheet::table).any(|t| &t.id == table) {
                return Err(StoreError::TableExists(table.to_string()));
            }
            check_sheet_name(table, sheets)?;
            sheets.push(Sheet::Table(Table::new(table.clone(), vec![column.clone()])));
            Ok(())
        })
    }

    fn read_columns(&self, table: &TableId) -> Result<Vec<Column>, StoreError> {
        self.load_tables()?
            .into_iter()
            .find(|t| &t.id == table)
            .map(|t| t.columns)
            .ok_or_else(|| StoreError::MissingTable(table.to_string()))
    }

    fn append_column(&self, table: &TableId, column: &Column) -> Result<(), StoreError> {
        check_column_fits(table, column)?;
        self.modify(|sheets| {
            match sheets
                .iter_mut()
                .filter_map(Sheet::table_mut)
                .find(|t| &t.id == table)
            {
                Some(t) if t.columns.len() >= MAX_COLUMNS => Err(StoreError::BadCell(format!(
                    "table {} already has {} columns",
                    table, MAX_COLUMNS
                ))),
                Some(t) => {
                    t.columns.push(column.clone());
                    Ok(())
                }
                None => Err(StoreError::MissingTable(table.to_string())),
            }
        })
    }

    fn list_tables(&self) -> Result<Vec<TableId>, StoreError> {
        Ok(self.load_tables()?.into_iter().map(|t| t.id).collect())
    }

    fn export_path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// A sheet holds the header and at most MAX_ROWS - 1 samples below it
fn check_column_fits(table: &TableId, column: &Column) -> Result<(), StoreError> {
    if column.len() >= MAX_ROWS {
        return Err(StoreError::BadCell(format!(
            "column {} for table {} has {} samples; a sheet holds at most {}",
            column.name,
            table,
            column.len(),
            MAX_ROWS - 1
        )));
    }
    Ok(())
}

/// Excel sheet names are at most 31 characters, avoid a few characters and are unique
/// regardless of case
fn check_sheet_name(table: &TableId, existing: &[Sheet]) -> Result<(), StoreError> {
    let name = table.as_str();
    let reject = |reason: &str| Err(StoreError::BadSheetName(name.to_string(), reason.to_string()));
    if name.chars().count() > MAX_SHEET_NAME_LENGTH {
        return reject("longer than 31 characters");
    }
    if name.contains(FORBIDDEN_SHEET_CHARS) {
        return reject("contains one of []:*?/\\");
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return reject("starts or ends with an apostrophe");
    }
    if existing
        .iter()
        .any(|sheet| sheet.name().to_lowercase() == name.to_lowercase())
    {
        return reject("differs from an existing sheet only by case");
    }
    Ok(())
}

fn write_table(worksheet: &mut Worksheet, table: &Table) -> Result<(), StoreError> {
    for (col, column) in table.columns.iter().enumerate() {
        let col = col as u16;
        worksheet.write_string(0, col, column.name.as_str())?;
        for (row, value) in column.values.iter().enumerate() {
            let row = row as u32 + 1;
            if value.is_finite() {
                worksheet.write_number(row, col, *value)?;
            } else {
                worksheet.write_string(row, col, non_finite_text(*value))?;
            }
        }
    }
    Ok(())
}

fn write_cells(worksheet: &mut Worksheet, cells: &Range<Data>) -> Result<(), StoreError> {
    // Ranges are relative to their first used cell
    let (first_row, first_col) = cells.start().unwrap_or((0, 0));
    for (row, col, cell) in cells.used_cells() {
        let row = first_row + row as u32;
        let col = (first_col as usize + col) as u16;
        match cell {
            Data::Int(i) => worksheet.write_number(row, col, *i as f64)?,
            Data::Float(f) => worksheet.write_number(row, col, *f)?,
            Data::DateTime(d) => worksheet.write_number(row, col, d.as_f64())?,
            Data::Bool(b) => worksheet.write_boolean(row, col, *b)?,
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
                worksheet.write_string(row, col, s.as_str())?
            }
            Data::Error(e) => worksheet.write_string(row, col, e.to_string())?,
            Data::Empty => continue,
        };
    }
    Ok(())
}

fn read_sheet_columns(sheet: &str, range: &Range<Data>) -> Result<Vec<Column>, StoreError> {
    let (height, width) = range.get_size();
    // Ranges start at the first used cell; headers always occupy row 0 from column A
    if height > 0 && range.start() != Some((0, 0)) {
        return Err(StoreError::BadCell(format!(
            "sheet {sheet:?} does not start at cell A1"
        )));
    }

    let mut columns = Vec::with_capacity(width);
    for col in 0..width {
        let name = match range.get((0, col)) {
            Some(Data::String(s)) => s.clone(),
            Some(Data::Empty) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let mut values = Vec::new();
        for row in 1..height {
            match range.get((row, col)) {
                Some(Data::Empty) | None => break,
                Some(cell) => values.push(cell_to_sample(sheet, row, col, cell)?),
            }
        }
        columns.push(Column { name, values });
    }
    Ok(columns)
}

fn cell_to_sample(sheet: &str, row: usize, col: usize, cell: &Data) -> Result<f64, StoreError> {
    let bad_cell = || {
        StoreError::BadCell(format!(
            "sheet {sheet:?} row {} column {} holds {cell:?}, not a number",
            row + 1,
            col + 1
        ))
    };
    match cell {
        Data::Float(f) => Ok(*f),
        Data::Int(i) => Ok(*i as f64),
        Data::String(s) => parse_sample_text(s).ok_or_else(bad_cell),
        _ => Err(bad_cell()),
    }
}
