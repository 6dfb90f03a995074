use fxhash::FxHashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::column::Column;
use super::config::DuplicatePolicy;
use super::error::{MergeError, StoreError};
use super::naming::{unique_column_name, TableId};
use super::store::TabularStore;

/// What a successful merge did to the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The table did not exist and now holds only this column
    Created { column: String },
    /// The column was appended at `index`, right of every existing column
    Appended { index: usize, column: String },
    /// An existing column already holds identical samples; nothing was written
    AlreadyPresent { existing: String },
}

/// Merges new columns into the tables of a store.
///
/// Tables only ever grow to the right: existing columns are never rewritten, reordered or
/// resized, and columns of different length are stored as they are. Merges into the same table
/// are serialized; merges into different tables may run concurrently. There are no retries
/// here, a failed merge is reported and left to the caller.
#[derive(Debug)]
pub struct TableMerger<S: TabularStore> {
    store: S,
    policy: DuplicatePolicy,
    locks: Mutex<FxHashMap<TableId, Arc<Mutex<()>>>>,
}

impl<S: TabularStore> TableMerger<S> {
    pub fn new(store: S, policy: DuplicatePolicy) -> Self {
        Self {
            store,
            policy,
            locks: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    fn table_lock(&self, table: &TableId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(table.clone()).or_default().clone()
    }

    /// Merge `column` into `table`, creating the table if needed.
    ///
    /// If the name is already taken in the table, the column is renamed with the first free
    /// `-N` suffix. The store writes the column completely or not at all, so on
    /// `MergeFailed` the table is as it was.
    pub fn merge(&self, table: &TableId, mut column: Column) -> Result<MergeOutcome, MergeError> {
        let lock = self.table_lock(table);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let failed = |source: StoreError| MergeError::MergeFailed {
            table: table.to_string(),
            source,
        };

        if !self.store.exists(table).map_err(failed)? {
            self.store.create(table, &column).map_err(failed)?;
            spdlog::info!(
                "Created table {} with column {} ({} samples)",
                table,
                column.name,
                column.len()
            );
            return Ok(MergeOutcome::Created {
                column: column.name,
            });
        }

        let existing = self.store.read_columns(table).map_err(failed)?;
        if self.policy == DuplicatePolicy::SkipIdentical {
            if let Some(duplicate) = existing.iter().find(|c| c.same_values(&column)) {
                spdlog::info!(
                    "Column {} of table {} already holds these samples, skipping",
                    duplicate.name,
                    table
                );
                return Ok(MergeOutcome::AlreadyPresent {
                    existing: duplicate.name.clone(),
                });
            }
        }

        column.name = unique_column_name(&column.name, existing.iter().map(|c| c.name.as_str()));
        self.store.append_column(table, &column).map_err(failed)?;
        spdlog::info!(
            "Appended column {} to table {} at position {} ({} samples)",
            column.name,
            table,
            existing.len(),
            column.len()
        );
        Ok(MergeOutcome::Appended {
            index: existing.len(),
            column: column.name,
        })
    }
}
