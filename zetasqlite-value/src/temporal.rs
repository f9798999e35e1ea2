//! Temporal parsing battery, `EXTRACT` part switch, and the strftime-like
//! matcher table (`spec.md §4.1`).

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};

use crate::error::{Result, ValueError};

/// Tried in order: full RFC3339, without-offset, date-only, date+time-space,
/// space-separated with offset, with named zone.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| temporal_err(input, "DATE"))
}

pub fn parse_time(input: &str) -> Result<NaiveTime> {
    let trimmed = input.trim();
    for fmt in ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(trimmed, fmt) {
            return Ok(t);
        }
    }
    Err(temporal_err(input, "TIME"))
}

pub fn parse_datetime(input: &str) -> Result<NaiveDateTime> {
    let trimmed = input.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(dt);
        }
    }
    if let Ok(date) = parse_date(trimmed) {
        return Ok(date.and_hms_opt(0, 0, 0).expect("midnight is always a valid time"));
    }
    Err(temporal_err(input, "DATETIME"))
}

/// Full battery: RFC3339, without-offset, date-only, date+time-space,
/// space-separated with offset, named zone (treated as UTC — the host has
/// no timezone database of its own).
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f %z") {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S %z") {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = parse_date(trimmed) {
        return Ok(Utc.from_utc_datetime(
            &date.and_hms_opt(0, 0, 0).expect("midnight is always a valid time"),
        ));
    }
    Err(temporal_err(input, "TIMESTAMP"))
}

fn temporal_err(input: &str, kind: &'static str) -> ValueError {
    ValueError::TemporalParse {
        input: input.to_string(),
        kind,
    }
}

/// `EXTRACT(part FROM timestamp)`. Driven by a small string-keyed switch
/// over the supported parts.
pub fn extract_part(part: &str, ts: &DateTime<Utc>) -> Result<i64> {
    Ok(match part.to_ascii_uppercase().as_str() {
        "YEAR" => ts.year() as i64,
        "QUARTER" => (ts.month0() / 3 + 1) as i64,
        "MONTH" => ts.month() as i64,
        "WEEK" => ts.iso_week().week() as i64,
        "ISOWEEK" => ts.iso_week().week() as i64,
        "DAY" => ts.day() as i64,
        "HOUR" => ts.hour() as i64,
        "MINUTE" => ts.minute() as i64,
        "SECOND" => ts.second() as i64,
        "MILLISECOND" => (ts.nanosecond() / 1_000_000) as i64,
        "MICROSECOND" => (ts.nanosecond() / 1_000) as i64,
        other => return Err(ValueError::UnknownExtractPart(other.to_string())),
    })
}

/// The accumulator a strftime-style matcher mutates as it consumes a
/// prefix of the target string.
#[derive(Debug, Default, Clone)]
pub struct TimeAccumulator {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

type Matcher = fn(&str, &mut TimeAccumulator) -> Result<usize>;

fn match_digits(input: &str, max_len: usize) -> Result<(i64, usize)> {
    let digits: String = input.chars().take(max_len).take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(ValueError::MalformedWire("expected digits".into()));
    }
    let len = digits.len();
    Ok((digits.parse().expect("digit string parses as integer"), len))
}

fn matcher_year(input: &str, acc: &mut TimeAccumulator) -> Result<usize> {
    let (v, len) = match_digits(input, 4)?;
    acc.year = v as i32;
    Ok(len)
}

fn matcher_month(input: &str, acc: &mut TimeAccumulator) -> Result<usize> {
    let (v, len) = match_digits(input, 2)?;
    acc.month = v as u32;
    Ok(len)
}

fn matcher_day(input: &str, acc: &mut TimeAccumulator) -> Result<usize> {
    let (v, len) = match_digits(input, 2)?;
    acc.day = v as u32;
    Ok(len)
}

fn matcher_hour(input: &str, acc: &mut TimeAccumulator) -> Result<usize> {
    let (v, len) = match_digits(input, 2)?;
    acc.hour = v as u32;
    Ok(len)
}

fn matcher_minute(input: &str, acc: &mut TimeAccumulator) -> Result<usize> {
    let (v, len) = match_digits(input, 2)?;
    acc.minute = v as u32;
    Ok(len)
}

fn matcher_second(input: &str, acc: &mut TimeAccumulator) -> Result<usize> {
    let (v, len) = match_digits(input, 2)?;
    acc.second = v as u32;
    Ok(len)
}

fn lookup_matcher(letter: char) -> Option<Matcher> {
    Some(match letter {
        'Y' => matcher_year,
        'm' => matcher_month,
        'd' => matcher_day,
        'H' => matcher_hour,
        'M' => matcher_minute,
        'S' => matcher_second,
        _ => return None,
    })
}

/// Walks `format` and `target` in lockstep: literal characters are matched
/// directly, `%<letter>` dispatches to the matcher table. An unconsumed
/// tail in `target` is a failure.
pub fn strptime(format: &str, target: &str) -> Result<TimeAccumulator> {
    let mut acc = TimeAccumulator::default();
    let mut fmt_chars = format.chars().peekable();
    let mut remaining = target;

    while let Some(fc) = fmt_chars.next() {
        if fc == '%' {
            let letter = fmt_chars
                .next()
                .ok_or_else(|| ValueError::MalformedWire("trailing %".into()))?;
            let matcher = lookup_matcher(letter)
                .ok_or(ValueError::UnknownFormatSpecifier(letter))?;
            let consumed = matcher(remaining, &mut acc)?;
            remaining = &remaining[consumed..];
        } else {
            let mut chars = remaining.chars();
            if chars.next() != Some(fc) {
                return Err(ValueError::MalformedWire(format!(
                    "expected literal '{fc}' in '{target}'"
                )));
            }
            remaining = chars.as_str();
        }
    }

    if !remaining.is_empty() {
        return Err(ValueError::MalformedWire(format!(
            "unconsumed trailing content: '{remaining}'"
        )));
    }

    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_year_quarter_week() {
        let ts = parse_timestamp("2024-03-15T12:00:00Z").unwrap();
        assert_eq!(extract_part("YEAR", &ts).unwrap(), 2024);
        assert_eq!(extract_part("QUARTER", &ts).unwrap(), 1);
        assert_eq!(extract_part("DAY", &ts).unwrap(), 15);
    }

    #[test]
    fn strptime_consumes_literal_and_digits() {
        let acc = strptime("%Y-%m-%d %H:%M:%S", "2024-03-15 12:30:05").unwrap();
        assert_eq!(acc.year, 2024);
        assert_eq!(acc.month, 3);
        assert_eq!(acc.day, 15);
        assert_eq!(acc.hour, 12);
        assert_eq!(acc.minute, 30);
        assert_eq!(acc.second, 5);
    }

    #[test]
    fn strptime_rejects_trailing_content() {
        assert!(strptime("%Y", "2024-extra").is_err());
    }
}
