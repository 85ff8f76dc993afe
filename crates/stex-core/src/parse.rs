//! Helpers turning captured text into typed values.
//!
//! Patterns always capture raw text (see [`crate::section::LinePattern`]);
//! these functions do the numeric and date parsing. Statements use both
//! German (`1.234,56`) and plain (`1234.56`) number formats, so the
//! separator roles are decided heuristically per value.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::{ExtractError, Result};

lazy_static! {
    static ref CURRENCY_CODE: Regex = Regex::new(r"^[A-Za-z]{3}$").unwrap();
}

/// Parse a monetary amount into minor units (`"1.234,56"` -> `123456`).
///
/// A value without decimal digits is taken as whole currency units.
pub fn parse_amount(field: &str, value: &str) -> Result<i64> {
    let decimal = parse_decimal(field, value)?;
    (decimal * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| parse_error(field, value))
}

/// Parse a share quantity, keeping fractional shares exact.
///
/// Separator handling follows [`parse_decimal`]: a dot followed by
/// exactly three digits is read as a thousands separator, so
/// `"378.125"` parses as 378125 whole shares. Patterns for documents
/// that print fractional quantities in dot format must capture the
/// comma form (`378,125`) instead.
pub fn parse_shares(field: &str, value: &str) -> Result<Decimal> {
    parse_decimal(field, value)
}

/// Parse an exchange rate.
pub fn parse_rate(field: &str, value: &str) -> Result<Decimal> {
    parse_decimal(field, value)
}

/// Parse a decimal with heuristic separator handling.
///
/// If both separators appear, the last one is the decimal point. A lone
/// comma is always decimal. A lone dot is decimal unless followed by
/// exactly three digits, which marks it as a thousands separator
/// (`"1.234"` -> 1234, `"1234.56"` -> 1234.56).
pub fn parse_decimal(field: &str, value: &str) -> Result<Decimal> {
    let cleaned: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    if cleaned.is_empty() {
        return Err(parse_error(field, value));
    }

    let comma = cleaned.rfind(',');
    let dot = cleaned.rfind('.');
    let normalized = match (comma, dot) {
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => cleaned.replace(',', "."),
        (None, Some(d)) if cleaned.len() - d == 4 => cleaned.replace('.', ""),
        _ => cleaned,
    };

    normalized
        .parse::<Decimal>()
        .map_err(|_| parse_error(field, value))
}

/// Parse a statement date (`"17.01.2024"` or `"2024-01-17"`).
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, "%d.%m.%Y")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .map_err(|_| parse_error(field, value))
}

/// Parse a date with an optional execution time (`"12:01:02"` or
/// `"12:01"`); midnight when no time was captured.
pub fn parse_date_time(field: &str, date: &str, time: Option<&str>) -> Result<NaiveDateTime> {
    let date = parse_date(field, date)?;
    let time = match time {
        Some(t) => {
            let t = t.trim();
            NaiveTime::parse_from_str(t, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M"))
                .map_err(|_| parse_error(field, t))?
        }
        None => NaiveTime::MIN,
    };
    Ok(date.and_time(time))
}

/// Validate and normalize a three-letter currency code.
pub fn parse_currency(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if CURRENCY_CODE.is_match(trimmed) {
        Ok(trimmed.to_ascii_uppercase())
    } else {
        Err(parse_error(field, value))
    }
}

fn parse_error(field: &str, value: &str) -> ExtractError {
    ExtractError::Parse {
        field: field.to_string(),
        value: value.to_string(),
    }
}
