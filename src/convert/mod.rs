//! Value coercion between external representations and typed cells
//!
//! Conversion never fails: malformed input degrades to a defined fallback
//! (`0` for numbers, `None` for dates, an empty table for unparsable table
//! JSON) so a long conversion pipeline over noisy data always completes.

mod date;

use std::cell::Cell;

use chrono::{Datelike, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{CellValue, Row, Table};

pub use date::DateFormat;

use date::{deduce_format, is_epoch_like, parse_timestamp, PatternOutcome};

/// Closed classification used by [`Converter::as_guessed_type`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessedType {
    Number,
    Date,
    String,
}

/// Converter configuration
#[derive(Debug, Clone, Default)]
pub struct ConverterOptions {
    /// One of the enumerated format names, or empty for auto-detection
    pub date_format: Option<String>,
    /// Decimal separator used by numeric strings (`.` or `,`)
    pub decimal_point: Option<char>,
}

/// Custom date-parsing hook bypassing the built-in format registry
pub type ParseDateFn = Box<dyn Fn(&str) -> Option<i64> + Send + Sync>;

static NUMERIC_WITH_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9\s]+$").unwrap());

/// Stateless-per-instance value coercion and date-format detection.
///
/// The only side effect is [`Converter::parse_date`]'s session-scoped format
/// memoization: once an unformatted parse discovers a matching format, the
/// format is reused for all later unformatted calls on the same instance.
pub struct Converter {
    options: ConverterOptions,
    decimal_regex: Option<Regex>,
    parse_date_fn: Option<ParseDateFn>,
    detected_format: Cell<Option<DateFormat>>,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("options", &self.options)
            .field("custom_parse_date", &self.parse_date_fn.is_some())
            .field("detected_format", &self.detected_format.get())
            .finish()
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(ConverterOptions::default())
    }
}

impl Converter {
    pub fn new(options: ConverterOptions) -> Self {
        let decimal_regex = options.decimal_point.and_then(|sep| {
            let pattern = format!("^(-?[0-9]+){}([0-9]+)$", regex::escape(&sep.to_string()));
            Regex::new(&pattern).ok()
        });
        Self {
            options,
            decimal_regex,
            parse_date_fn: None,
            detected_format: Cell::new(None),
        }
    }

    /// Install a custom date-parsing function; `parse_date` then delegates
    /// to it exclusively.
    pub fn with_parse_date(mut self, parse_date: ParseDateFn) -> Self {
        self.parse_date_fn = Some(parse_date);
        self
    }

    pub fn options(&self) -> &ConverterOptions {
        &self.options
    }

    /// Coerce a value to boolean.
    ///
    /// Booleans pass through; a string is `true` unless it is exactly
    /// empty, `"0"`, or `"false"`; anything else compares `as_number != 0`.
    pub fn as_boolean(&self, value: &CellValue) -> bool {
        match value {
            CellValue::Bool(b) => *b,
            CellValue::String(s) => !s.is_empty() && s != "0" && s != "false",
            _ => self.as_number(value) != 0.0,
        }
    }

    /// Coerce a value to a number.
    ///
    /// Strings are stripped of whitespace and decimal-separator normalized
    /// before parsing; an unparsable string yields `0`, never NaN. A table
    /// yields its row count. A date yields its day of month; callers
    /// needing timestamps use [`Converter::as_date`].
    pub fn as_number(&self, value: &CellValue) -> f64 {
        match value {
            CellValue::Number(n) => *n,
            CellValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            CellValue::String(s) => {
                let mut v: String = if s.contains(char::is_whitespace) {
                    s.chars().filter(|c| !c.is_whitespace()).collect()
                } else {
                    s.clone()
                };
                if let Some(re) = &self.decimal_regex {
                    v = re.replace(&v, "${1}.${2}").into_owned();
                }
                v.parse::<f64>()
                    .ok()
                    .filter(|n| !n.is_nan())
                    .unwrap_or(0.0)
            }
            CellValue::Table(t) => t.row_count() as f64,
            CellValue::Date(dt) => f64::from(dt.day()),
            CellValue::Absent => 0.0,
        }
    }

    /// Coerce a value to its default textual representation
    pub fn as_string(&self, value: &CellValue) -> String {
        value.to_string()
    }

    /// Coerce a value to a date.
    ///
    /// Strings go through [`Converter::parse_date`]; numbers are epoch
    /// millisecond timestamps; dates pass through; anything else is
    /// stringified first. An unparsable value yields `None`, never a panic.
    pub fn as_date(&self, value: &CellValue) -> Option<NaiveDateTime> {
        match value {
            CellValue::String(s) => self.parse_date(s, None).and_then(date::millis_to_naive),
            CellValue::Number(n) => {
                if n.is_finite() {
                    date::millis_to_naive(*n as i64)
                } else {
                    None
                }
            }
            CellValue::Date(dt) => Some(*dt),
            other => self
                .parse_date(&self.as_string(other), None)
                .and_then(date::millis_to_naive),
        }
    }

    /// Coerce a value to a table.
    ///
    /// Tables pass through; falsy values (per [`Converter::as_boolean`])
    /// become an empty table; strings are parsed as serialized table JSON,
    /// falling back to an empty table; anything else is wrapped as a
    /// single-row, single-cell table holding a deep copy of the value.
    pub fn as_data_table(&self, value: &CellValue) -> Table {
        match value {
            CellValue::Table(t) => t.clone(),
            v if !self.as_boolean(v) => Table::new(),
            CellValue::String(s) => serde_json::from_str(s).unwrap_or_default(),
            v => {
                let mut table = Table::new();
                let _ = table.insert_row(Row::new().with_cell("value", v.clone()));
                table
            }
        }
    }

    /// Convert a value into its guessed native type
    pub fn as_guessed_type(&self, value: &CellValue) -> CellValue {
        if value.is_absent() {
            return CellValue::Absent;
        }
        match self.guess_type(value) {
            GuessedType::Number => CellValue::Number(self.as_number(value)),
            GuessedType::Date => self
                .as_date(value)
                .map(CellValue::Date)
                .unwrap_or(CellValue::Absent),
            GuessedType::String => CellValue::String(self.as_string(value)),
        }
    }

    /// Classify a value as number, date, or string.
    ///
    /// A string that parses losslessly as a finite float is a number, unless
    /// its magnitude exceeds a year of milliseconds, in which case it is an
    /// epoch-like date. Otherwise a successful date parse classifies it as a
    /// date, and anything else stays a string.
    pub fn guess_type(&self, value: &CellValue) -> GuessedType {
        match value {
            CellValue::String(s) => {
                let trimmed = self.trim(s, false);
                let inner = self.trim(&trimmed, true);
                if let Some(n) = inner.parse::<f64>().ok().filter(|n| n.is_finite()) {
                    if is_epoch_like(n) {
                        GuessedType::Date
                    } else {
                        GuessedType::Number
                    }
                } else if self.parse_date(&trimmed, None).is_some() {
                    GuessedType::Date
                } else {
                    GuessedType::String
                }
            }
            CellValue::Number(n) => {
                if is_epoch_like(*n) {
                    GuessedType::Date
                } else {
                    GuessedType::Number
                }
            }
            CellValue::Date(_) => GuessedType::Date,
            CellValue::Bool(_) => GuessedType::Number,
            CellValue::Table(_) | CellValue::Absent => GuessedType::String,
        }
    }

    /// Strip leading and trailing whitespace.
    ///
    /// With `inside_numeric`, a string of digits and interior whitespace
    /// loses the interior whitespace too (thousands-separator spacing).
    /// When a decimal separator is configured, `<digits><sep><digits>` is
    /// rewritten into canonical dot-decimal form.
    pub fn trim(&self, value: &str, inside_numeric: bool) -> String {
        let mut v = value.trim().to_string();
        if inside_numeric && NUMERIC_WITH_SPACE_RE.is_match(&v) {
            v.retain(|c| !c.is_whitespace());
        }
        if let Some(re) = &self.decimal_regex {
            v = re.replace(&v, "${1}.${2}").into_owned();
        }
        v
    }

    /// Parse a date string into a UTC millisecond timestamp.
    ///
    /// With a custom parse function installed, it is delegated to
    /// exclusively. Otherwise the explicit format name, the configured one,
    /// or the memoized auto-detected one is applied; with none of those the
    /// fixed registry is tried in declaration order and the first matching
    /// format is remembered for later unformatted calls. A known-but-
    /// unregistered name falls back to `YYYY/mm/dd`. A pattern match with
    /// invalid calendar components retries the format's alternative. When no
    /// pattern matches, generic timezone-normalizing timestamp parsing is
    /// the last resort; `None` means every strategy failed.
    pub fn parse_date(&self, value: &str, format_name: Option<&str>) -> Option<i64> {
        if let Some(parse) = &self.parse_date_fn {
            return parse(value);
        }

        let format = format_name
            .map(|name| DateFormat::from_name(name).unwrap_or(DateFormat::YearMonthDay))
            .or_else(|| {
                self.options
                    .date_format
                    .as_deref()
                    .filter(|name| !name.is_empty())
                    .map(|name| DateFormat::from_name(name).unwrap_or(DateFormat::YearMonthDay))
            })
            .or_else(|| self.detected_format.get());

        match format {
            Some(format) => match format.apply(value) {
                PatternOutcome::Parsed(millis) => Some(millis),
                PatternOutcome::Invalid => self
                    .apply_alternative(format, value)
                    .or_else(|| parse_timestamp(value)),
                PatternOutcome::NoMatch => parse_timestamp(value),
            },
            None => {
                for format in DateFormat::ALL {
                    match format.apply(value) {
                        PatternOutcome::NoMatch => continue,
                        PatternOutcome::Parsed(millis) => {
                            self.detected_format.set(Some(format));
                            return Some(millis);
                        }
                        PatternOutcome::Invalid => {
                            self.detected_format.set(Some(format));
                            if let Some(millis) = self.apply_alternative(format, value) {
                                return Some(millis);
                            }
                            break;
                        }
                    }
                }
                parse_timestamp(value)
            }
        }
    }

    /// Retry a pattern match under the day/month-swapped format
    fn apply_alternative(&self, format: DateFormat, value: &str) -> Option<i64> {
        let alternative = format.alternative()?;
        match alternative.apply(value) {
            PatternOutcome::Parsed(millis) => {
                if self.detected_format.get() == Some(format) {
                    self.detected_format.set(Some(alternative));
                }
                Some(millis)
            }
            _ => None,
        }
    }

    /// Deduce a date-format name from up to `limit` string samples.
    ///
    /// With `persist`, the deduced format becomes the instance's active
    /// format for future [`Converter::parse_date`] calls.
    pub fn deduce_date_format<S: AsRef<str>>(
        &self,
        samples: &[S],
        limit: Option<usize>,
        persist: bool,
    ) -> String {
        let name = deduce_format(samples, limit);
        if persist {
            self.detected_format.set(Some(
                DateFormat::from_name(&name).unwrap_or(DateFormat::YearMonthDay),
            ));
        }
        name
    }

    /// The format discovered by auto-detection or persisted deduction
    pub fn detected_date_format(&self) -> Option<DateFormat> {
        self.detected_format.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converter() -> Converter {
        Converter::default()
    }

    #[test]
    fn test_as_boolean() {
        let c = converter();
        assert!(c.as_boolean(&CellValue::Bool(true)));
        assert!(!c.as_boolean(&CellValue::Bool(false)));
        assert!(!c.as_boolean(&CellValue::String("".into())));
        assert!(!c.as_boolean(&CellValue::String("0".into())));
        assert!(!c.as_boolean(&CellValue::String("false".into())));
        assert!(c.as_boolean(&CellValue::String("no".into())));
        assert!(c.as_boolean(&CellValue::Number(2.0)));
        assert!(!c.as_boolean(&CellValue::Number(0.0)));
        assert!(!c.as_boolean(&CellValue::Absent));
    }

    #[test]
    fn test_as_number_with_decimal_comma() {
        let c = Converter::new(ConverterOptions {
            decimal_point: Some(','),
            ..Default::default()
        });
        assert_eq!(c.as_number(&CellValue::String("1 234,5".into())), 1234.5);
        assert_eq!(c.as_number(&CellValue::String("-12,25".into())), -12.25);
    }

    #[test]
    fn test_as_number_fallbacks() {
        let c = converter();
        assert_eq!(c.as_number(&CellValue::String("garbage".into())), 0.0);
        assert_eq!(c.as_number(&CellValue::String("NaN".into())), 0.0);
        assert_eq!(c.as_number(&CellValue::Bool(true)), 1.0);
        assert_eq!(c.as_number(&CellValue::Absent), 0.0);
    }

    #[test]
    fn test_as_number_of_table_is_row_count() {
        let c = converter();
        let mut table = Table::new();
        table.insert_row(Row::new().with_cell("x", 1.0)).unwrap();
        table.insert_row(Row::new().with_cell("x", 2.0)).unwrap();
        assert_eq!(c.as_number(&CellValue::Table(table)), 2.0);
    }

    #[test]
    fn test_as_number_of_date_is_day_of_month() {
        let c = converter();
        let dt = c.as_date(&CellValue::String("2020/01/15".into())).unwrap();
        assert_eq!(c.as_number(&CellValue::Date(dt)), 15.0);
    }

    #[test]
    fn test_as_date_of_number_is_timestamp() {
        let c = converter();
        let dt = c.as_date(&CellValue::Number(1_577_836_800_000.0)).unwrap();
        assert_eq!(dt.to_string(), "2020-01-01 00:00:00");
    }

    #[test]
    fn test_as_data_table() {
        let c = converter();

        assert!(c.as_data_table(&CellValue::Absent).is_empty());
        assert!(c.as_data_table(&CellValue::String("false".into())).is_empty());
        assert!(c.as_data_table(&CellValue::String("junk{".into())).is_empty());

        let wrapped = c.as_data_table(&CellValue::Number(7.0));
        assert_eq!(wrapped.row_count(), 1);
        assert_eq!(
            wrapped.get_row_by_index(0).unwrap().cell("value"),
            Some(&CellValue::Number(7.0))
        );

        let json = r#"{"classTag":"Table","rows":[{"id":"r0","cells":{"x":1.0}}]}"#;
        let parsed = c.as_data_table(&CellValue::String(json.into()));
        assert_eq!(parsed.row_count(), 1);
        assert_eq!(
            parsed.get_row("r0").unwrap().cell("x"),
            Some(&CellValue::Number(1.0))
        );
    }

    #[test]
    fn test_guess_type() {
        let c = converter();
        assert_eq!(
            c.guess_type(&CellValue::String("1577836800000".into())),
            GuessedType::Date
        );
        assert_eq!(c.guess_type(&CellValue::String("42".into())), GuessedType::Number);
        assert_eq!(
            c.guess_type(&CellValue::String("hello".into())),
            GuessedType::String
        );
        assert_eq!(
            c.guess_type(&CellValue::String("2020/01/02".into())),
            GuessedType::Date
        );
        assert_eq!(
            c.guess_type(&CellValue::String("1 234".into())),
            GuessedType::Number,
            "interior whitespace in numeric strings is removed first"
        );
    }

    #[test]
    fn test_as_guessed_type() {
        let c = converter();
        assert_eq!(
            c.as_guessed_type(&CellValue::String("42".into())),
            CellValue::Number(42.0)
        );
        assert_eq!(
            c.as_guessed_type(&CellValue::String("hello".into())),
            CellValue::String("hello".into())
        );
        assert_eq!(c.as_guessed_type(&CellValue::Absent), CellValue::Absent);
        match c.as_guessed_type(&CellValue::String("2020/01/02".into())) {
            CellValue::Date(dt) => assert_eq!(dt.to_string(), "2020-01-02 00:00:00"),
            other => panic!("expected date, got {other:?}"),
        }
    }

    #[test]
    fn test_trim() {
        let c = Converter::new(ConverterOptions {
            decimal_point: Some(','),
            ..Default::default()
        });
        assert_eq!(c.trim("  abc  ", false), "abc");
        assert_eq!(c.trim("1 234", true), "1234");
        assert_eq!(c.trim("1 a34", true), "1 a34", "non-numeric keeps interior spaces");
        assert_eq!(c.trim("12,5", false), "12.5");
    }

    #[test]
    fn test_parse_date_detection_is_memoized() {
        let c = converter();
        assert!(c.detected_date_format().is_none());
        // dd/mm and mm/dd share a pattern; declaration order finds dd/mm first
        let first = c.parse_date("01/02/2020", None).unwrap();
        assert_eq!(c.detected_date_format(), Some(DateFormat::DayMonthYear));
        // Later unformatted calls reuse the remembered format
        let second = c.parse_date("02/02/2020", None).unwrap();
        assert_eq!(second - first, 86_400_000);
    }

    #[test]
    fn test_parse_date_explicit_format() {
        let c = converter();
        let dmy = c.parse_date("01/02/2020", Some("dd/mm/YYYY")).unwrap();
        let mdy = c.parse_date("01/02/2020", Some("mm/dd/YYYY")).unwrap();
        assert_ne!(dmy, mdy);
        // Unregistered names default to YYYY/mm/dd
        let ymd = c.parse_date("2020/02/01", Some("YY/mm/dd")).unwrap();
        assert_eq!(ymd, dmy);
    }

    #[test]
    fn test_parse_date_invalid_components_use_alternative() {
        let c = converter();
        // Month 31 is invalid under mm/dd/YYYY; the shared-pattern
        // alternative reads it as dd/mm/YYYY
        let millis = c.parse_date("31/12/2020", Some("mm/dd/YYYY")).unwrap();
        let expected = c.parse_date("2020/12/31", Some("YYYY/mm/dd")).unwrap();
        assert_eq!(millis, expected);
    }

    #[test]
    fn test_parse_date_fallback_timezone() {
        let c = converter();
        assert_eq!(
            c.parse_date("2020-01-01T00:00:00Z", None),
            Some(1_577_836_800_000)
        );
        assert_eq!(c.parse_date("never", None), None);
    }

    #[test]
    fn test_custom_parse_date_bypasses_registry() {
        let c = converter().with_parse_date(Box::new(|value| {
            if value == "epoch" {
                Some(0)
            } else {
                None
            }
        }));
        assert_eq!(c.parse_date("epoch", None), Some(0));
        assert_eq!(c.parse_date("2020/01/01", None), None);
    }

    #[test]
    fn test_deduce_date_format_persists() {
        let c = converter();
        let name = c.deduce_date_format(&["31/12/2020", "01/01/2021"], None, true);
        assert_eq!(name, "dd/mm/YYYY");
        assert_eq!(c.detected_date_format(), Some(DateFormat::DayMonthYear));
        // The persisted format now drives unformatted parses
        let millis = c.parse_date("02/01/2021", None).unwrap();
        let expected = c.parse_date("2021/01/02", Some("YYYY/mm/dd")).unwrap();
        assert_eq!(millis, expected);
    }

    #[test]
    fn test_configured_date_format() {
        let c = Converter::new(ConverterOptions {
            date_format: Some("mm/dd/YYYY".into()),
            ..Default::default()
        });
        let millis = c.parse_date("01/02/2020", None).unwrap();
        let expected = c.parse_date("2020/01/02", Some("YYYY/mm/dd")).unwrap();
        assert_eq!(millis, expected);
    }
}
