use super::column::{Column, Table};
use super::error::StoreError;
use super::naming::TableId;
use super::store::TabularStore;

/// Every table of a store, read at one point in time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub tables: Vec<Table>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub name: String,
    pub count: usize,
    /// Smallest and largest sample, ignoring NaN. None if there is no such sample.
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary {
    pub id: TableId,
    pub n_rows: usize,
    pub columns: Vec<ColumnSummary>,
}

impl Dataset {
    pub fn load<S: TabularStore + ?Sized>(store: &S) -> Result<Self, StoreError> {
        let mut tables = Vec::new();
        for id in store.list_tables()? {
            let columns = store.read_columns(&id)?;
            tables.push(Table::new(id, columns));
        }
        Ok(Self { tables })
    }

    pub fn table(&self, id: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.id.as_str() == id)
    }

    pub fn summaries(&self) -> Vec<TableSummary> {
        self.tables
            .iter()
            .map(|table| TableSummary {
                id: table.id.clone(),
                n_rows: table.n_rows(),
                columns: table.columns.iter().map(summarize).collect(),
            })
            .collect()
    }
}

fn summarize(column: &Column) -> ColumnSummary {
    let mut min: Option<f64> = None;
    let mut max: Option<f64> = None;
    for value in column.values.iter().filter(|v| !v.is_nan()) {
        min = Some(min.map_or(*value, |m| m.min(*value)));
        max = Some(max.map_or(*value, |m| m.max(*value)));
    }
    ColumnSummary {
        name: column.name.clone(),
        count: column.len(),
        min,
        max,
    }
}

/// Result of reading the store for display
#[derive(Debug)]
pub enum SnapshotView<'a> {
    /// Freshly read from the store
    Live(&'a Dataset),
    /// The store could not be read; this is the last dataset that could
    Stale(&'a Dataset, StoreError),
    /// The store could not be read and nothing was ever read from it
    Unavailable(StoreError),
}

impl SnapshotView<'_> {
    pub fn dataset(&self) -> Option<&Dataset> {
        match self {
            Self::Live(dataset) | Self::Stale(dataset, _) => Some(*dataset),
            Self::Unavailable(_) => None,
        }
    }
}

/// Holds the last dataset read successfully, which is only handed out while the store is
/// unreachable.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    last_good: Option<Dataset>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_good(&self) -> Option<&Dataset> {
        self.last_good.as_ref()
    }

    pub fn refresh<S: TabularStore + ?Sized>(&mut self, store: &S) -> SnapshotView<'_> {
        match Dataset::load(store) {
            Ok(dataset) => SnapshotView::Live(self.last_good.insert(dataset)),
            Err(e) => match &self.last_good {
                Some(dataset) => {
                    spdlog::warn!("Store unavailable, showing last good snapshot: {}", e);
                    SnapshotView::Stale(dataset, e)
                }
                None => SnapshotView::Unavailable(e),
            },
        }
    }
}
