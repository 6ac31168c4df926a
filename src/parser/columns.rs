//! Ordered column export and the in-memory columns parser

use std::cmp::Ordering;

use crate::convert::{Converter, ConverterOptions};
use crate::error::ParseError;
use crate::events::{EventEmitter, ListenerHandle};
use crate::model::{CellValue, Table, ID_COLUMN};

use super::{ParseEvent, Parser};

/// Extract `(names, values)` column sequences from a table, sorted by the
/// table's presentation comparator. The `id` column is optionally excluded;
/// the two sequences always stay index-aligned.
pub fn export_columns(table: &Table, include_id: bool) -> (Vec<String>, Vec<Vec<CellValue>>) {
    export_columns_with(table, include_id, table.presentation().sorter())
}

/// Column export with a caller-supplied name comparator
pub fn export_columns_with<F>(
    table: &Table,
    include_id: bool,
    compare: F,
) -> (Vec<String>, Vec<Vec<CellValue>>)
where
    F: Fn(&str, &str) -> Ordering,
{
    let mut columns = table.to_columns();
    if !include_id {
        columns.shift_remove(ID_COLUMN);
    }

    let mut names: Vec<String> = columns.keys().cloned().collect();
    names.sort_by(|a, b| compare(a, b));

    let values = names
        .iter()
        .map(|name| columns.swap_remove(name).unwrap_or_default())
        .collect();
    (names, values)
}

/// Input for [`ColumnsParser`]: raw string columns with header names
#[derive(Debug, Clone, Default)]
pub struct ColumnsParserOptions {
    /// Column-major raw cell text; empty strings read as absent cells
    pub columns: Vec<Vec<String>>,
    /// Header names; columns past the end get generated names
    pub headers: Vec<String>,
    /// Conversion configuration for cell coercion
    pub converter: ConverterOptions,
}

/// Converts raw string columns into a typed table.
///
/// Each cell goes through the converter's guessed-type coercion. When no
/// date format is configured, the first column whose values all look like
/// multi-component dates supplies samples for format deduction before any
/// cell is converted.
pub struct ColumnsParser {
    options: ColumnsParserOptions,
    converter: Converter,
    table: Table,
    emitter: EventEmitter<ParseEvent>,
}

impl ColumnsParser {
    pub fn new(options: ColumnsParserOptions) -> Self {
        let converter = Converter::new(options.converter.clone());
        Self {
            options,
            converter,
            table: Table::new(),
            emitter: EventEmitter::new(),
        }
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    /// Deduce and persist a date format from the first date-looking column
    fn deduce_date_format(&self) {
        if self
            .converter
            .options()
            .date_format
            .as_deref()
            .is_some_and(|name| !name.is_empty())
        {
            return;
        }
        for column in &self.options.columns {
            let samples: Vec<&str> = column
                .iter()
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .collect();
            if samples.is_empty() || !samples.iter().all(|value| looks_like_date(value)) {
                continue;
            }
            let format = self.converter.deduce_date_format(&samples, None, true);
            tracing::debug!(format = %format, samples = samples.len(), "deduced date format");
            return;
        }
    }

    fn fail(&self, error: ParseError) -> Result<(), ParseError> {
        self.emitter.emit(&ParseEvent::ParseError {
            message: error.to_string(),
        });
        Err(error)
    }
}

/// A value is date-like when it splits into at least two numeric components
fn looks_like_date(value: &str) -> bool {
    if value.parse::<f64>().is_ok() {
        return false;
    }
    let components: Vec<&str> = value.split(['-', '.', '/']).collect();
    components.len() >= 2
        && components
            .iter()
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

impl Parser for ColumnsParser {
    fn parse(&mut self) -> Result<(), ParseError> {
        self.emitter.emit(&ParseEvent::Parse {
            headers: self.options.headers.clone(),
        });

        if self.options.headers.len() > self.options.columns.len() {
            return self.fail(ParseError::HeaderCountMismatch {
                headers: self.options.headers.len(),
                columns: self.options.columns.len(),
            });
        }

        self.deduce_date_format();

        let typed: Vec<Vec<CellValue>> = self
            .options
            .columns
            .iter()
            .map(|column| {
                column
                    .iter()
                    .map(|raw| {
                        if raw.is_empty() {
                            CellValue::Absent
                        } else {
                            self.converter.as_guessed_type(&CellValue::from(raw.as_str()))
                        }
                    })
                    .collect()
            })
            .collect();

        let table = match Table::from_columns(typed.clone(), self.options.headers.clone()) {
            Ok(table) => table,
            Err(error) => return self.fail(error.into()),
        };

        tracing::debug!(
            columns = typed.len(),
            rows = table.row_count(),
            "parsed columns into table"
        );

        let headers = table.presentation().ordered_names();
        self.table = table;
        self.emitter.emit(&ParseEvent::AfterParse {
            headers,
            columns: typed,
        });
        Ok(())
    }

    fn table(&self) -> Table {
        self.table.clone()
    }

    fn on(&mut self, listener: Box<dyn Fn(&ParseEvent) + Send + Sync>) -> ListenerHandle {
        self.emitter.on(listener)
    }

    fn off(&mut self, handle: ListenerHandle) -> bool {
        self.emitter.off(handle)
    }
}
