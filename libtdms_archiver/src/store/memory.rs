use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::TabularStore;
use crate::column::{Column, Table};
use crate::error::StoreError;
use crate::naming::TableId;

/// In-memory store for tests. Can be switched to reject writes or all access.
#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    tables: Mutex<Vec<Table>>,
    reject_writes: AtomicBool,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn table(&self, id: &str) -> Option<Table> {
        self.tables
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id.as_str() == id)
            .cloned()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Transport(String::from("store unavailable")));
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        self.check_available()?;
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Transport(String::from("writes rejected")));
        }
        Ok(())
    }
}

impl TabularStore for MemoryStore {
    fn exists(&self, table: &TableId) -> Result<bool, StoreError> {
        self.check_available()?;
        Ok(self.tables.lock().unwrap().iter().any(|t| &t.id == table))
    }

    fn create(&self, table: &TableId, column: &Column) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();
        if tables.iter().any(|t| &t.id == table) {
            return Err(StoreError::TableExists(table.to_string()));
        }
        tables.push(Table::new(table.clone(), vec![column.clone()]));
        Ok(())
    }

    fn read_columns(&self, table: &TableId) -> Result<Vec<Column>, StoreError> {
        self.check_available()?;
        self.tables
            .lock()
            .unwrap()
            .iter()
            .find(|t| &t.id == table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| StoreError::MissingTable(table.to_string()))
    }

    fn append_column(&self, table: &TableId, column: &Column) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();
        match tables.iter_mut().find(|t| &t.id == table) {
            Some(t) => {
                t.columns.push(column.clone());
                Ok(())
            }
            None => Err(StoreError::MissingTable(table.to_string())),
        }
    }

    fn list_tables(&self) -> Result<Vec<TableId>, StoreError> {
        self.check_available()?;
        Ok(self
            .tables
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.id.clone())
            .collect())
    }
}
