//! Row-oriented table store and its presentation sub-state

use std::cmp::Ordering;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::de::Error as DeError;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TableError;

use super::cell::CellValue;
use super::row::Row;

/// Name of the synthetic identifier column in the column representation
pub const ID_COLUMN: &str = "id";

/// Column display metadata: a mapping from column name to display index,
/// independent of storage order. Columns absent from the mapping sort last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Presentation {
    column_indices: IndexMap<String, usize>,
}

impl Presentation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign sequential display indices matching the given name order,
    /// replacing any previous assignment.
    pub fn set_column_order<I>(&mut self, names: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.column_indices.clear();
        for (index, name) in names.into_iter().enumerate() {
            self.column_indices.insert(name.into(), index);
        }
    }

    /// Display index assigned to a column, if any
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_indices.get(name).copied()
    }

    /// Strict total order over column names, consistent with the assigned
    /// indices: indexed columns first (by index), unindexed columns after
    /// (by name).
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match (self.column_index(a), self.column_index(b)) {
            (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        }
    }

    /// Comparator closure for sorting column-name lists
    pub fn sorter(&self) -> impl Fn(&str, &str) -> Ordering + '_ {
        move |a, b| self.compare(a, b)
    }

    /// Names with an assigned index, in display order
    pub fn ordered_names(&self) -> Vec<String> {
        let mut entries: Vec<(&String, usize)> = self
            .column_indices
            .iter()
            .map(|(name, index)| (name, *index))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        entries.into_iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.column_indices.is_empty()
    }
}

/// A row-oriented table: an insertion-ordered sequence of rows with unique
/// identifiers, plus a [`Presentation`] governing column display order.
///
/// The table owns its rows and presentation state exclusively; cloning
/// deep-copies both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    rows: Vec<Row>,
    row_index: FxHashMap<String, usize>,
    presentation: Presentation,
}

impl Table {
    /// Create a new empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row to the table. Rejects a duplicate row identifier.
    pub fn insert_row(&mut self, row: Row) -> Result<(), TableError> {
        if self.row_index.contains_key(row.id()) {
            return Err(TableError::DuplicateRowId(row.id().to_string()));
        }
        self.row_index.insert(row.id().to_string(), self.rows.len());
        self.rows.push(row);
        Ok(())
    }

    /// Add several rows, stopping at the first duplicate identifier
    pub fn insert_rows<I>(&mut self, rows: I) -> Result<(), TableError>
    where
        I: IntoIterator<Item = Row>,
    {
        for row in rows {
            self.insert_row(row)?;
        }
        Ok(())
    }

    /// Remove a row by identifier, preserving the order of the remaining
    /// rows. Returns the removed row if it existed.
    pub fn delete_row(&mut self, id: &str) -> Option<Row> {
        let index = self.row_index.remove(id)?;
        let row = self.rows.remove(index);
        self.rebuild_row_index();
        Some(row)
    }

    /// Rebuild the id index after a structural mutation
    fn rebuild_row_index(&mut self) {
        self.row_index.clear();
        for (index, row) in self.rows.iter().enumerate() {
            self.row_index.insert(row.id().to_string(), index);
        }
    }

    /// Look up a row by identifier
    pub fn get_row(&self, id: &str) -> Option<&Row> {
        self.row_index.get(id).map(|&index| &self.rows[index])
    }

    /// Mutable row access by identifier
    pub fn get_row_mut(&mut self, id: &str) -> Option<&mut Row> {
        let index = *self.row_index.get(id)?;
        self.rows.get_mut(index)
    }

    /// Row access by insertion position
    pub fn get_row_by_index(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// All rows in insertion order
    pub fn get_all_rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct cell names across all rows, in row-scan discovery order
    pub fn column_names(&self) -> Vec<String> {
        let mut names: IndexMap<&str, ()> = IndexMap::new();
        for row in &self.rows {
            for name in row.cell_names() {
                names.entry(name).or_insert(());
            }
        }
        names.into_keys().map(str::to_string).collect()
    }

    /// Convert to the column representation.
    ///
    /// The `id` column comes first, then one column per distinct cell name in
    /// row-scan discovery order. Rows with heterogeneous cell sets are padded
    /// with [`CellValue::Absent`] so every column's length equals the row
    /// count.
    pub fn to_columns(&self) -> IndexMap<String, Vec<CellValue>> {
        let mut columns: IndexMap<String, Vec<CellValue>> = IndexMap::new();
        columns.insert(ID_COLUMN.to_string(), Vec::with_capacity(self.rows.len()));

        for (row_position, row) in self.rows.iter().enumerate() {
            if let Some(ids) = columns.get_mut(ID_COLUMN) {
                ids.push(CellValue::String(row.id().to_string()));
            }
            for (name, value) in row.cells() {
                let column = columns
                    .entry(name.clone())
                    .or_insert_with(|| vec![CellValue::Absent; row_position]);
                column.push(value.clone());
            }
            // Columns this row had no cell for fall behind by one
            for column in columns.values_mut() {
                if column.len() <= row_position {
                    column.push(CellValue::Absent);
                }
            }
        }

        columns
    }

    /// Build a table from equal-length column arrays.
    ///
    /// Columns without a header get a generated unique name. A header named
    /// `id` supplies row identifiers instead of cells. The header order is
    /// recorded as the table's presentation order.
    pub fn from_columns(
        columns: Vec<Vec<CellValue>>,
        headers: Vec<String>,
    ) -> Result<Self, TableError> {
        let mut names: Vec<String> = Vec::with_capacity(columns.len());
        for position in 0..columns.len() {
            match headers.get(position) {
                Some(header) => names.push(header.clone()),
                None => {
                    let mut candidate = position;
                    loop {
                        let name = format!("column{candidate}");
                        if !headers.contains(&name) && !names.contains(&name) {
                            names.push(name);
                            break;
                        }
                        candidate += 1;
                    }
                }
            }
        }

        let row_count = columns.first().map(Vec::len).unwrap_or(0);
        for (name, column) in names.iter().zip(&columns) {
            if column.len() != row_count {
                return Err(TableError::ColumnLengthMismatch {
                    name: name.clone(),
                    len: column.len(),
                    expected: row_count,
                });
            }
        }

        let id_position = names.iter().position(|name| name == ID_COLUMN);

        let mut table = Table::new();
        for row_position in 0..row_count {
            let mut row = match id_position {
                Some(p) => match &columns[p][row_position] {
                    CellValue::Absent => Row::new(),
                    CellValue::String(id) => Row::with_id(id.clone()),
                    other => Row::with_id(other.to_string()),
                },
                None => Row::new(),
            };
            for (column_position, name) in names.iter().enumerate() {
                if Some(column_position) == id_position {
                    continue;
                }
                row.insert_cell(name.clone(), columns[column_position][row_position].clone());
            }
            table.insert_row(row)?;
        }

        table.presentation.set_column_order(
            names
                .iter()
                .enumerate()
                .filter(|(position, _)| Some(*position) != id_position)
                .map(|(_, name)| name.clone()),
        );

        Ok(table)
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    pub fn presentation_mut(&mut self) -> &mut Presentation {
        &mut self.presentation
    }

    /// Shorthand for assigning the presentation column order
    pub fn set_column_order<I>(&mut self, names: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.presentation.set_column_order(names);
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let order = self.presentation.ordered_names();
        let field_count = if order.is_empty() { 2 } else { 3 };
        let mut state = serializer.serialize_struct("Table", field_count)?;
        state.serialize_field("classTag", "Table")?;
        state.serialize_field("rows", &self.rows)?;
        if !order.is_empty() {
            state.serialize_field("columnOrder", &order)?;
        }
        state.end()
    }
}

impl<'de> Deserialize<'de> for Table {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct TableJson {
            class_tag: String,
            #[serde(default)]
            rows: Vec<Row>,
            #[serde(default)]
            column_order: Vec<String>,
        }

        let json = TableJson::deserialize(deserializer)?;
        if json.class_tag != "Table" {
            return Err(D::Error::custom(TableError::ClassTagMismatch {
                expected: "Table".to_string(),
                found: json.class_tag,
            }));
        }

        let mut table = Table::new();
        for row in json.rows {
            table.insert_row(row).map_err(D::Error::custom)?;
        }
        if !json.column_order.is_empty() {
            table.presentation.set_column_order(json.column_order);
        }
        Ok(table)
    }
}
