//! Table rows: unique identifier plus a name-addressed cell map

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::cell::CellValue;

static NEXT_AUTO_ID: AtomicU64 = AtomicU64::new(0);

/// Generate a process-unique row identifier
fn next_auto_id() -> String {
    format!("row-{}", NEXT_AUTO_ID.fetch_add(1, Ordering::Relaxed))
}

/// A row in a table: a unique identifier and an insertion-ordered mapping
/// from column name to cell value. Rows are mutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    id: String,
    #[serde(default)]
    cells: IndexMap<String, CellValue>,
}

impl Row {
    /// Create an empty row with a generated identifier
    pub fn new() -> Self {
        Self::with_id(next_auto_id())
    }

    /// Create an empty row with the given identifier
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cells: IndexMap::new(),
        }
    }

    /// Builder-style cell insertion
    pub fn with_cell(mut self, name: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.insert_cell(name, value);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get a cell value by column name
    pub fn cell(&self, name: &str) -> Option<&CellValue> {
        self.cells.get(name)
    }

    /// Insert or update a cell; returns the previous value if any
    pub fn insert_cell(
        &mut self,
        name: impl Into<String>,
        value: impl Into<CellValue>,
    ) -> Option<CellValue> {
        self.cells.insert(name.into(), value.into())
    }

    /// Remove a cell, preserving the order of the remaining cells
    pub fn remove_cell(&mut self, name: &str) -> Option<CellValue> {
        self.cells.shift_remove(name)
    }

    /// Cell names in insertion order
    pub fn cell_names(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    pub fn cells(&self) -> &IndexMap<String, CellValue> {
        &self.cells
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

impl Default for Row {
    fn default() -> Self {
        Self::new()
    }
}
