use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use dlogger_parser::{RawCell, RawRow};

use crate::numeric::parse_decimal;
use crate::profiles::TimestampRule;

const DAY_FIRST_DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d", "%d/%m/%y"];
const ISO_FIRST_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"];
const MILLIS_PER_DAY: f64 = 86_400_000.0;
// 9999-12-31
const MAX_DATE_SERIAL: f64 = 2_958_465.0;

/// Rebuilds the timestamp of one raw row, or explains why it cannot.
pub fn resolve_timestamp(rule: &TimestampRule, row: &RawRow<'_>) -> Result<NaiveDateTime, String> {
    let date_cell = cell(row, rule.date_column())?;
    let time_cell = cell(row, rule.time_column())?;

    match rule {
        TimestampRule::ConcatenateDateAndTimeString { .. } => {
            concatenate_date_and_time(date_cell, time_cell)
        }
        TimestampRule::DateAndDurationString { .. } => {
            let date = parse_date(date_cell, ISO_FIRST_DATE_FORMATS)?;
            let offset = match time_cell {
                RawCell::Number(_) => parse_day_fraction(time_cell)?,
                _ => parse_clock_duration(time_cell)?,
            };
            at_offset(date, offset)
        }
        TimestampRule::DateAndFractionOfDay { .. } => {
            let date = parse_date(date_cell, DAY_FIRST_DATE_FORMATS)?;
            let offset = parse_day_fraction(time_cell)?;
            at_offset(date, offset)
        }
    }
}

fn cell<'a>(row: &RawRow<'a>, column: &str) -> Result<&'a RawCell, String> {
    match row.get(column) {
        Some(RawCell::Empty) | None => Err(format!("column '{column}' is empty")),
        Some(value) => Ok(value),
    }
}

fn concatenate_date_and_time(date_cell: &RawCell, time_cell: &RawCell) -> Result<NaiveDateTime, String> {
    if let (RawCell::Text(date), RawCell::Text(time)) = (date_cell, time_cell) {
        let joined = format!("{} {}", date_part(date), pad_clock(time.trim()));
        return parse_day_first_datetime(&joined)
            .ok_or_else(|| format!("'{date} {time}' is not a day-first date and time"));
    }

    // Spreadsheet cells: serial date and/or serial time.
    let date = parse_date(date_cell, DAY_FIRST_DATE_FORMATS)?;
    let offset = match time_cell {
        RawCell::Number(_) => parse_day_fraction(time_cell)?,
        _ => clock_time(time_cell)?.signed_duration_since(NaiveTime::MIN),
    };
    at_offset(date, offset)
}

fn at_offset(date: NaiveDate, offset: Duration) -> Result<NaiveDateTime, String> {
    date.and_time(NaiveTime::MIN)
        .checked_add_signed(offset)
        .ok_or_else(|| format!("{date} plus {offset} is out of range"))
}

fn parse_day_first_datetime(text: &str) -> Option<NaiveDateTime> {
    let (date_text, time_text) = text.split_once(char::is_whitespace)?;
    let date = parse_date_text(date_text, DAY_FIRST_DATE_FORMATS)?;
    let time = parse_time_text(time_text.trim())?;
    Some(date.and_time(time))
}

fn parse_date(cell: &RawCell, formats: &[&str]) -> Result<NaiveDate, String> {
    match cell {
        RawCell::Number(serial) => serial_date(*serial)
            .ok_or_else(|| format!("'{serial}' is not a spreadsheet date serial")),
        RawCell::Text(text) => parse_date_text(text, formats)
            .ok_or_else(|| format!("'{text}' is not a recognised date")),
        RawCell::Empty => Err("date is empty".to_string()),
    }
}

/// Re-saved exports write `01/02/2023 00:00:00` into date columns; the clock part is ignored.
fn date_part(text: &str) -> &str {
    text.split_whitespace().next().unwrap_or_default()
}

fn parse_date_text(text: &str, formats: &[&str]) -> Option<NaiveDate> {
    let trimmed = date_part(text);
    formats.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(trimmed, fmt)
            .ok()
            // `%Y` happily reads "23" as year 23; leave two-digit years to `%y`.
            .filter(|date| date.year() >= 1000)
    })
}

fn parse_time_text(text: &str) -> Option<NaiveTime> {
    let padded = pad_clock(text);
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(&padded, fmt).ok())
}

fn clock_time(cell: &RawCell) -> Result<NaiveTime, String> {
    match cell {
        RawCell::Text(text) => {
            parse_time_text(text).ok_or_else(|| format!("'{text}' is not a clock time"))
        }
        other => Err(format!("'{other}' is not a clock time")),
    }
}

/// Zero-pads each `:`-separated clock component, so `0:5:0` reads as `00:05:00`.
fn pad_clock(text: &str) -> String {
    text.split(':')
        .map(|part| {
            let integer_len = part.find('.').unwrap_or(part.len());
            if integer_len == 1 && part.as_bytes()[0].is_ascii_digit() {
                format!("0{part}")
            } else {
                part.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(":")
}

/// `H:MM[:SS[.f]]` since midnight; hours may run past 23.
fn parse_clock_duration(cell: &RawCell) -> Result<Duration, String> {
    let RawCell::Text(text) = cell else {
        return Err(format!("'{cell}' is not a clock duration"));
    };
    let invalid = || format!("'{text}' is not a clock duration");

    let parts: Vec<&str> = text.trim().split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return Err(invalid());
    }

    let hours: u32 = parts[0].trim().parse().map_err(|_| invalid())?;
    let minutes: u32 = parts[1].trim().parse().map_err(|_| invalid())?;
    let seconds: f64 = match parts.get(2) {
        Some(value) => value.trim().parse().map_err(|_| invalid())?,
        None => 0.0,
    };
    if minutes >= 60 || hours > 240_000 || !(0.0..60.0).contains(&seconds) {
        return Err(invalid());
    }

    let millis = (f64::from(hours) * 3_600_000.0 + f64::from(minutes) * 60_000.0 + seconds * 1000.0)
        .round() as i64;
    Ok(Duration::milliseconds(millis))
}

fn parse_day_fraction(cell: &RawCell) -> Result<Duration, String> {
    let fraction = match cell {
        RawCell::Number(value) => Some(*value),
        RawCell::Text(text) => parse_decimal(text),
        RawCell::Empty => None,
    }
    .ok_or_else(|| format!("'{cell}' is not a fraction of a day"))?;

    if !(0.0..1.0).contains(&fraction) {
        return Err(format!("fraction of day {fraction} is outside [0, 1)"));
    }
    Ok(Duration::milliseconds((fraction * MILLIS_PER_DAY).round() as i64))
}

/// Spreadsheet serial day (1900 date system) to a calendar date.
fn serial_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=MAX_DATE_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}
