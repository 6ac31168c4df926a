//! Date-format registry, deduction heuristics, and fallback timestamp parsing
//!
//! The format registry is fixed: five slash/dash/dot separated calendar
//! formats, tried in declaration order during auto-detection. The `dd/mm/*`
//! and `mm/dd/*` pairs share one pattern each and are told apart only by the
//! deduction heuristic or explicit configuration.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Milliseconds in one year; numeric literals above this are epoch-like
const MILLIS_IN_YEAR: f64 = 365.0 * 24.0 * 3600.0 * 1000.0;

/// Magnitudes beyond a year of milliseconds read as epoch timestamps
pub(crate) fn is_epoch_like(value: f64) -> bool {
    value > MILLIS_IN_YEAR
}

/// Millisecond UTC timestamp to a naive datetime
pub(crate) fn millis_to_naive(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

static YMD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<year>[0-9]{4})(?P<sep1>[-./])(?P<a>[0-9]{1,2})(?P<sep2>[-./])(?P<b>[0-9]{1,2})$")
        .unwrap()
});

static DM_LONG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<a>[0-9]{1,2})(?P<sep1>[-./])(?P<b>[0-9]{1,2})(?P<sep2>[-./])(?P<year>[0-9]{4})$")
        .unwrap()
});

static DM_SHORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<a>[0-9]{1,2})(?P<sep1>[-./])(?P<b>[0-9]{1,2})(?P<sep2>[-./])(?P<year>[0-9]{2})$")
        .unwrap()
});

/// The fixed, enumerable set of recognized date-format names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateFormat {
    /// `YYYY/mm/dd`
    YearMonthDay,
    /// `dd/mm/YYYY`
    DayMonthYear,
    /// `mm/dd/YYYY`
    MonthDayYear,
    /// `dd/mm/YY`
    DayMonthYearShort,
    /// `mm/dd/YY`
    MonthDayYearShort,
}

/// Outcome of applying one format's pattern to an input string
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum PatternOutcome {
    /// The pattern did not match at all
    NoMatch,
    /// The pattern matched but the components are not a valid calendar date
    Invalid,
    /// A UTC millisecond timestamp
    Parsed(i64),
}

impl DateFormat {
    /// Registry declaration order, used for auto-detection
    pub const ALL: [DateFormat; 5] = [
        DateFormat::YearMonthDay,
        DateFormat::DayMonthYear,
        DateFormat::MonthDayYear,
        DateFormat::DayMonthYearShort,
        DateFormat::MonthDayYearShort,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DateFormat::YearMonthDay => "YYYY/mm/dd",
            DateFormat::DayMonthYear => "dd/mm/YYYY",
            DateFormat::MonthDayYear => "mm/dd/YYYY",
            DateFormat::DayMonthYearShort => "dd/mm/YY",
            DateFormat::MonthDayYearShort => "mm/dd/YY",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "YYYY/mm/dd" => Some(DateFormat::YearMonthDay),
            "dd/mm/YYYY" => Some(DateFormat::DayMonthYear),
            "mm/dd/YYYY" => Some(DateFormat::MonthDayYear),
            "dd/mm/YY" => Some(DateFormat::DayMonthYearShort),
            "mm/dd/YY" => Some(DateFormat::MonthDayYearShort),
            _ => None,
        }
    }

    /// The format sharing this one's pattern with day and month swapped
    pub fn alternative(self) -> Option<Self> {
        match self {
            DateFormat::YearMonthDay => None,
            DateFormat::DayMonthYear => Some(DateFormat::MonthDayYear),
            DateFormat::MonthDayYear => Some(DateFormat::DayMonthYear),
            DateFormat::DayMonthYearShort => Some(DateFormat::MonthDayYearShort),
            DateFormat::MonthDayYearShort => Some(DateFormat::DayMonthYearShort),
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            DateFormat::YearMonthDay => &YMD_RE,
            DateFormat::DayMonthYear | DateFormat::MonthDayYear => &DM_LONG_RE,
            DateFormat::DayMonthYearShort | DateFormat::MonthDayYearShort => &DM_SHORT_RE,
        }
    }

    /// Match `value` against this format's pattern and compose a timestamp.
    pub(crate) fn apply(self, value: &str) -> PatternOutcome {
        let caps = match self.pattern().captures(value) {
            Some(caps) => caps,
            None => return PatternOutcome::NoMatch,
        };
        // Both separators must agree ("2020/01-02" is not a date)
        if caps.name("sep1").map(|m| m.as_str()) != caps.name("sep2").map(|m| m.as_str()) {
            return PatternOutcome::NoMatch;
        }
        match self.compose(&caps) {
            Some(millis) => PatternOutcome::Parsed(millis),
            None => PatternOutcome::Invalid,
        }
    }

    fn compose(self, caps: &Captures<'_>) -> Option<i64> {
        let year = group_int(caps, "year")?;
        let a = group_int(caps, "a")?;
        let b = group_int(caps, "b")?;
        let (year, month, day) = match self {
            DateFormat::YearMonthDay => (year as i32, a, b),
            DateFormat::DayMonthYear => (year as i32, b, a),
            DateFormat::MonthDayYear => (year as i32, a, b),
            DateFormat::DayMonthYearShort => (year as i32 + 2000, b, a),
            DateFormat::MonthDayYearShort => (year as i32 + 2000, a, b),
        };
        utc_midnight_millis(year, month, day)
    }
}

impl std::fmt::Display for DateFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for DateFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DateFormat::from_name(s).ok_or_else(|| format!("unknown date format: {s}"))
    }
}

fn group_int(caps: &Captures<'_>, name: &str) -> Option<u32> {
    caps.name(name)?.as_str().parse().ok()
}

fn utc_midnight_millis(year: i32, month: u32, day: u32) -> Option<i64> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

static TZ_HINT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r":.+(GMT|UTC|[Z+\-])").unwrap());
static COMPACT_OFFSET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:GMT|UTC)?([+\-])([0-9]{2})([0-9]{2})$").unwrap());
static OFFSET_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\s+|GMT|UTC)([+\-])").unwrap());
static ZULU_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9])\s*(?:GMT|UTC|Z)$").unwrap());

const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
];

const NAIVE_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d",
];

/// Generic timestamp parsing with timezone normalization.
///
/// Trailing `GMT`/`UTC`/`Z` markers and compact `+HHMM` offsets are first
/// canonicalized to a `+HH:MM` suffix, then the value is parsed as an
/// offset-aware or naive datetime. The result is a UTC-normalized millisecond
/// timestamp regardless of the host locale; naive values are read as UTC.
pub(crate) fn parse_timestamp(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Bare numeric literals are epoch milliseconds
    if let Ok(millis) = trimmed.parse::<f64>() {
        if millis.is_finite() {
            return Some(millis as i64);
        }
        return None;
    }

    let mut v = trimmed.to_string();
    if TZ_HINT_RE.is_match(&v) {
        v = COMPACT_OFFSET_RE.replace(&v, "${1}${2}:${3}").into_owned();
        v = OFFSET_PREFIX_RE.replace(&v, "${1}").into_owned();
        v = ZULU_RE.replace(&v, "${1}+00:00").into_owned();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&v) {
        return Some(dt.timestamp_millis());
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&v, format) {
            return Some(dt.timestamp_millis());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(&v) {
        return Some(dt.timestamp_millis());
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&v, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
        if let Ok(date) = NaiveDate::parse_from_str(&v, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp_millis());
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stability {
    Unseen,
    Stable(u32),
    Unstable,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ComponentGuess {
    Unknown,
    Month,
    Day,
    YearShort,
    YearLong,
}

impl ComponentGuess {
    fn token(self) -> &'static str {
        match self {
            ComponentGuess::Unknown => "",
            ComponentGuess::Month => "mm",
            ComponentGuess::Day => "dd",
            ComponentGuess::YearShort => "YY",
            ComponentGuess::YearLong => "YYYY",
        }
    }

    fn is_year(self) -> bool {
        matches!(self, ComponentGuess::YearShort | ComponentGuess::YearLong)
    }
}

/// JS-style leading integer parse: digits up to the first non-digit
fn parse_leading_int(s: &str) -> Option<u32> {
    let end = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    s[..end].parse().ok()
}

/// Deduce a date-format name from string samples.
///
/// Each sample is split on `/`, `-`, `.` into up to three numeric
/// components. Per position the maximum value and the cross-sample stability
/// are tracked; values above 31 classify as years, values in (12, 31] as
/// days, the rest tentatively as months. Two repair passes and a day/day
/// ambiguity fix follow. Without any day-range evidence the default
/// `YYYY/mm/dd` is returned.
pub(crate) fn deduce_format<S: AsRef<str>>(samples: &[S], limit: Option<usize>) -> String {
    let limit = match limit {
        Some(limit) if limit > 0 && limit < samples.len() => limit,
        _ => samples.len(),
    };

    let mut max = [0u32; 3];
    let mut stability = [Stability::Unseen; 3];
    let mut guessed = [ComponentGuess::Unknown; 3];
    let mut made_deduction = false;

    for sample in &samples[..limit] {
        let sample = sample.as_ref().trim();
        if sample.is_empty() {
            continue;
        }
        // Positions beyond the third are ignored, not guessed at
        guessed = [ComponentGuess::Unknown; 3];
        for (position, part) in sample
            .split(['-', '.', '/', ' '])
            .take(3)
            .enumerate()
        {
            let Some(value) = parse_leading_int(part) else {
                continue;
            };
            if value == 0 {
                continue;
            }
            max[position] = max[position].max(value);
            stability[position] = match stability[position] {
                Stability::Unseen => Stability::Stable(value),
                Stability::Stable(seen) if seen == value => Stability::Stable(seen),
                _ => Stability::Unstable,
            };
            if value > 31 {
                guessed[position] = if value < 100 {
                    ComponentGuess::YearShort
                } else {
                    ComponentGuess::YearLong
                };
            } else if value > 12 {
                guessed[position] = ComponentGuess::Day;
                made_deduction = true;
            } else if guessed[position] == ComponentGuess::Unknown {
                guessed[position] = ComponentGuess::Month;
            }
        }
    }

    if !made_deduction {
        return DateFormat::YearMonthDay.name().to_string();
    }

    for position in 0..3 {
        match stability[position] {
            Stability::Unstable => {
                // A varying component that exceeds the month range is a day
                if max[position] > 12 && guessed[position] == ComponentGuess::Month {
                    guessed[position] = ComponentGuess::Day;
                }
            }
            _ => {
                // Stable beyond the month range can only be a year
                if max[position] > 12 && !guessed[position].is_year() {
                    guessed[position] = ComponentGuess::YearShort;
                }
            }
        }
    }

    // Day in both trailing positions: the last one must be the year
    if guessed[1] == ComponentGuess::Day && guessed[2] == ComponentGuess::Day {
        guessed[2] = ComponentGuess::YearShort;
    }

    format!(
        "{}/{}/{}",
        guessed[0].token(),
        guessed[1].token(),
        guessed[2].token()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names_round_trip() {
        for format in DateFormat::ALL {
            assert_eq!(DateFormat::from_name(format.name()), Some(format));
        }
        assert_eq!(DateFormat::from_name("YY/mm/dd"), None);
    }

    #[test]
    fn test_apply_year_month_day() {
        assert_eq!(
            DateFormat::YearMonthDay.apply("2020/01/02"),
            PatternOutcome::Parsed(1_577_923_200_000)
        );
        // Dash and dot separators are accepted
        assert_eq!(
            DateFormat::YearMonthDay.apply("2020-01-02"),
            PatternOutcome::Parsed(1_577_923_200_000)
        );
        assert_eq!(DateFormat::YearMonthDay.apply("02/01/2020"), PatternOutcome::NoMatch);
    }

    #[test]
    fn test_mixed_separators_do_not_match() {
        assert_eq!(DateFormat::YearMonthDay.apply("2020/01-02"), PatternOutcome::NoMatch);
    }

    #[test]
    fn test_shared_pattern_day_month_swap() {
        // 31 is only a valid day; mm/dd sees month 31 and fails
        assert_eq!(
            DateFormat::MonthDayYear.apply("31/12/2020"),
            PatternOutcome::Invalid
        );
        assert_eq!(
            DateFormat::DayMonthYear.apply("31/12/2020"),
            PatternOutcome::Parsed(1_609_372_800_000)
        );
    }

    #[test]
    fn test_short_years_resolve_into_the_2000s() {
        let expected = utc_midnight_millis(2025, 1, 31).unwrap();
        assert_eq!(
            DateFormat::DayMonthYearShort.apply("31/01/25"),
            PatternOutcome::Parsed(expected)
        );
    }

    #[test]
    fn test_parse_timestamp_numeric_literal() {
        assert_eq!(parse_timestamp("1577836800000"), Some(1_577_836_800_000));
        assert_eq!(parse_timestamp("42"), Some(42));
    }

    #[test]
    fn test_parse_timestamp_zulu_and_offsets() {
        let base = parse_timestamp("2020-01-01T00:00:00Z").unwrap();
        assert_eq!(base, 1_577_836_800_000);
        assert_eq!(parse_timestamp("2020-01-01 00:00:00 UTC"), Some(base));
        assert_eq!(parse_timestamp("2020-01-01T01:00:00+01:00"), Some(base));
        assert_eq!(parse_timestamp("2020-01-01 01:00:00 GMT+0100"), Some(base));
    }

    #[test]
    fn test_parse_timestamp_naive_is_utc() {
        assert_eq!(parse_timestamp("2020-01-01 00:00:00"), Some(1_577_836_800_000));
        assert_eq!(parse_timestamp("2020-01-01"), Some(1_577_836_800_000));
        assert_eq!(parse_timestamp("not a date"), None);
    }

    #[test]
    fn test_deduce_day_first() {
        let samples = ["31/12/2020", "01/01/2021"];
        assert_eq!(deduce_format(&samples, None), "dd/mm/YYYY");
    }

    #[test]
    fn test_deduce_month_first() {
        let samples = ["12/31/2020", "01/01/2021"];
        assert_eq!(deduce_format(&samples, None), "mm/dd/YYYY");
    }

    #[test]
    fn test_deduce_double_day_forces_trailing_year() {
        let samples = ["01/20/30", "02/25/13"];
        assert_eq!(deduce_format(&samples, None), "mm/dd/YY");
    }

    #[test]
    fn test_deduce_without_evidence_defaults() {
        let samples = ["01/02/03", "04/05/06"];
        assert_eq!(deduce_format(&samples, None), "YYYY/mm/dd");
        let empty: [&str; 0] = [];
        assert_eq!(deduce_format(&empty, None), "YYYY/mm/dd");
    }

    #[test]
    fn test_deduce_honors_limit() {
        // The day-range evidence sits in the second sample, past the limit
        let samples = ["01/02/2020", "13/02/2020"];
        assert_eq!(deduce_format(&samples, Some(1)), "YYYY/mm/dd");
        assert_eq!(deduce_format(&samples, None), "dd/mm/YYYY");
    }
}
