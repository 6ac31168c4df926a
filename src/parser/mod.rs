//! Parser layer: conversions between tables and external tabular shapes

mod columns;
mod series;

use crate::error::ParseError;
use crate::events::ListenerHandle;
use crate::model::{CellValue, Table};

pub use self::columns::{
    export_columns, export_columns_with, ColumnsParser, ColumnsParserOptions,
};
pub use self::series::{
    point_array_from_row, point_array_map_for, series_options_from_table, table_from_series,
    Point, PointOptions,
};

/// Events emitted over a parse lifecycle.
///
/// Every parse begins with `Parse`, and ends with either `AfterParse`
/// carrying the effective headers and converted columns, or `ParseError`.
#[derive(Debug, Clone)]
pub enum ParseEvent {
    Parse {
        headers: Vec<String>,
    },
    AfterParse {
        headers: Vec<String>,
        columns: Vec<Vec<CellValue>>,
    },
    ParseError {
        message: String,
    },
}

/// Contract for converting an external representation into a [`Table`].
///
/// Implementations own their input and a converter for cell coercion; they
/// emit [`ParseEvent`]s around the conversion and expose the result as a
/// table snapshot.
pub trait Parser {
    /// Run the conversion, emitting `Parse`/`AfterParse`/`ParseError`
    fn parse(&mut self) -> Result<(), ParseError>;

    /// Snapshot of the most recently parsed table
    fn table(&self) -> Table;

    /// Register a parse-event listener
    fn on(&mut self, listener: Box<dyn Fn(&ParseEvent) + Send + Sync>) -> ListenerHandle;

    /// Remove a previously registered listener
    fn off(&mut self, handle: ListenerHandle) -> bool;
}
