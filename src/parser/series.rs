//! Conversions between tables and series/point option shapes

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::error::TableError;
use crate::model::{CellValue, Row, Table, ID_COLUMN};

/// One data point in its external form.
///
/// Positional arrays are interpreted through a point-array-map; structured
/// points carry their own field names; a bare scalar is an implicit
/// `(index, value)` pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Point {
    Positional(Vec<CellValue>),
    Structured(IndexMap<String, CellValue>),
    Scalar(CellValue),
}

/// One point-option record exported from a table row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointOptions {
    pub id: String,
    #[serde(flatten)]
    pub fields: IndexMap<String, CellValue>,
}

/// Default point-array-maps per well-known series type
static SERIES_POINT_ARRAY_MAPS: Lazy<FxHashMap<&'static str, &'static [&'static str]>> =
    Lazy::new(|| {
        let mut maps: FxHashMap<&'static str, &'static [&'static str]> = FxHashMap::default();
        for series_type in ["line", "spline", "area", "areaspline", "scatter", "column", "bar"] {
            maps.insert(series_type, &["x", "y"]);
        }
        for series_type in ["arearange", "columnrange"] {
            maps.insert(series_type, &["x", "low", "high"]);
        }
        maps.insert("bubble", &["x", "y", "z"]);
        for series_type in ["ohlc", "candlestick"] {
            maps.insert(series_type, &["x", "open", "high", "low", "close"]);
        }
        maps
    });

/// Default point-array-map for a named series type
pub fn point_array_map_for(series_type: &str) -> Option<&'static [&'static str]> {
    SERIES_POINT_ARRAY_MAPS.get(series_type).copied()
}

fn resolve_point_array_map(
    explicit: Option<&[String]>,
    series_type: Option<&str>,
) -> Vec<String> {
    if let Some(map) = explicit {
        return map.to_vec();
    }
    if let Some(map) = series_type.and_then(point_array_map_for) {
        return map.iter().map(|name| name.to_string()).collect();
    }
    vec!["x".to_string(), "y".to_string()]
}

/// Build a table from series points, one row per point.
///
/// The point-array-map resolves from the explicit list, then the named
/// series type's default, then `["x", "y"]`. A structured point's `id`
/// field becomes the row identifier; duplicate identifiers are rejected.
pub fn table_from_series(
    points: &[Point],
    point_array_map: Option<&[String]>,
    series_type: Option<&str>,
) -> Result<Table, TableError> {
    let map = resolve_point_array_map(point_array_map, series_type);
    let mut table = Table::new();

    for (index, point) in points.iter().enumerate() {
        let row = match point {
            Point::Positional(values) => {
                let mut row = Row::new();
                for (name, value) in map.iter().zip(values) {
                    row.insert_cell(name.clone(), value.clone());
                }
                row
            }
            Point::Structured(fields) => {
                let mut row = match fields.get(ID_COLUMN) {
                    Some(CellValue::String(id)) => Row::with_id(id.clone()),
                    Some(CellValue::Absent) | None => Row::new(),
                    Some(other) => Row::with_id(other.to_string()),
                };
                for (name, value) in fields {
                    if name == ID_COLUMN {
                        continue;
                    }
                    row.insert_cell(name.clone(), value.clone());
                }
                row
            }
            Point::Scalar(value) => Row::new()
                .with_cell("x", index as f64)
                .with_cell("y", value.clone()),
        };
        table.insert_row(row)?;
    }

    table.set_column_order(map);
    Ok(table)
}

/// Export one point-option record per row, preserving row order
pub fn series_options_from_table(table: &Table) -> Vec<PointOptions> {
    table
        .get_all_rows()
        .iter()
        .map(|row| PointOptions {
            id: row.id().to_string(),
            fields: row.cells().clone(),
        })
        .collect()
}

/// Re-encode a row positionally through a point-array-map; fields the row
/// lacks come out absent.
pub fn point_array_from_row(row: &Row, point_array_map: &[String]) -> Vec<CellValue> {
    point_array_map
        .iter()
        .map(|name| row.cell(name).cloned().unwrap_or(CellValue::Absent))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_point_round_trip() {
        let points = [Point::Positional(vec![
            CellValue::Number(3.0),
            CellValue::Number(7.0),
        ])];
        let map = vec!["x".to_string(), "y".to_string()];
        let table = table_from_series(&points, Some(&map), None).unwrap();

        let row = table.get_row_by_index(0).unwrap();
        assert_eq!(row.cell("x"), Some(&CellValue::Number(3.0)));
        assert_eq!(row.cell("y"), Some(&CellValue::Number(7.0)));

        assert_eq!(
            point_array_from_row(row, &map),
            vec![CellValue::Number(3.0), CellValue::Number(7.0)]
        );
    }

    #[test]
    fn test_scalar_points_become_index_value_pairs() {
        let points = [
            Point::Scalar(CellValue::Number(10.0)),
            Point::Scalar(CellValue::Number(20.0)),
        ];
        let table = table_from_series(&points, None, None).unwrap();
        let row = table.get_row_by_index(1).unwrap();
        assert_eq!(row.cell("x"), Some(&CellValue::Number(1.0)));
        assert_eq!(row.cell("y"), Some(&CellValue::Number(20.0)));
    }

    #[test]
    fn test_structured_point_id_becomes_row_id() {
        let mut fields = IndexMap::new();
        fields.insert("id".to_string(), CellValue::String("p1".into()));
        fields.insert("y".to_string(), CellValue::Number(5.0));
        let table = table_from_series(&[Point::Structured(fields)], None, None).unwrap();

        let row = table.get_row("p1").unwrap();
        assert_eq!(row.cell("y"), Some(&CellValue::Number(5.0)));
        assert_eq!(row.cell("id"), None, "id is not duplicated as a cell");
    }

    #[test]
    fn test_series_type_supplies_point_array_map() {
        let points = [Point::Positional(vec![
            CellValue::Number(1.0),
            CellValue::Number(2.0),
            CellValue::Number(3.0),
        ])];
        let table = table_from_series(&points, None, Some("arearange")).unwrap();
        let row = table.get_row_by_index(0).unwrap();
        assert_eq!(row.cell("low"), Some(&CellValue::Number(2.0)));
        assert_eq!(row.cell("high"), Some(&CellValue::Number(3.0)));

        assert_eq!(point_array_map_for("unknown"), None);
    }

    #[test]
    fn test_series_options_preserve_row_order() {
        let points = [
            Point::Scalar(CellValue::Number(1.0)),
            Point::Scalar(CellValue::Number(2.0)),
        ];
        let table = table_from_series(&points, None, None).unwrap();
        let options = series_options_from_table(&table);
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].fields["y"], CellValue::Number(1.0));
        assert_eq!(options[1].fields["y"], CellValue::Number(2.0));
        assert_eq!(options[0].id, table.get_row_by_index(0).unwrap().id());
    }

    #[test]
    fn test_extra_positional_values_are_ignored() {
        let points = [Point::Positional(vec![
            CellValue::Number(1.0),
            CellValue::Number(2.0),
            CellValue::Number(3.0),
        ])];
        let table = table_from_series(&points, None, None).unwrap();
        let row = table.get_row_by_index(0).unwrap();
        assert_eq!(row.cell_count(), 2, "values beyond the map are dropped");
    }
}
