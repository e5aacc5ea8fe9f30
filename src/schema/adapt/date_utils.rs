//! Module for handling date parsing and formatting.
//!
//! Dates arrive as free text in several layouts. They are parsed with an
//! ordered cascade of candidate formats (first match wins) and rendered in
//! the canonical `DD/MM/YYYY` form.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Date32Type};
use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::error::Result;

/// Canonical display format of every parsed date
pub const CANONICAL_DATE_FORMAT: &str = "%d/%m/%Y";

/// Days between 0001-01-01 (CE day 1) and the Unix epoch
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Order of the day, month and year tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrder {
    /// `YYYY?MM?DD`
    YearFirst,
    /// `DD?MM?YYYY`
    DayFirst,
}

/// One candidate format of the cascade
///
/// The shape check runs before chrono so that, for example, `%d/%m/%Y` does
/// not accept the two-digit year of `05/02/18` as year 18.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateFormat {
    /// chrono format string
    pub pattern: &'static str,
    /// Separator between the date tokens
    pub separator: char,
    /// Token order
    pub order: DateOrder,
    /// Exact number of digits in the year token
    pub year_digits: usize,
    /// Whether a ` HH:MM:SS` time part follows the date
    pub with_time: bool,
}

/// Candidate formats, in the order they are tried
pub static DATE_CASCADE: [DateFormat; 7] = [
    DateFormat {
        pattern: "%Y-%m-%d %H:%M:%S",
        separator: '-',
        order: DateOrder::YearFirst,
        year_digits: 4,
        with_time: true,
    },
    DateFormat {
        pattern: "%Y-%m-%d",
        separator: '-',
        order: DateOrder::YearFirst,
        year_digits: 4,
        with_time: false,
    },
    DateFormat {
        pattern: "%d/%m/%Y",
        separator: '/',
        order: DateOrder::DayFirst,
        year_digits: 4,
        with_time: false,
    },
    DateFormat {
        pattern: "%d/%m/%y",
        separator: '/',
        order: DateOrder::DayFirst,
        year_digits: 2,
        with_time: false,
    },
    DateFormat {
        pattern: "%d-%m-%Y",
        separator: '-',
        order: DateOrder::DayFirst,
        year_digits: 4,
        with_time: false,
    },
    DateFormat {
        pattern: "%d-%m-%y",
        separator: '-',
        order: DateOrder::DayFirst,
        year_digits: 2,
        with_time: false,
    },
    DateFormat {
        pattern: "%Y/%m/%d",
        separator: '/',
        order: DateOrder::YearFirst,
        year_digits: 4,
        with_time: false,
    },
];

impl DateFormat {
    /// Whether the text has the token layout of this format
    #[must_use]
    pub fn matches_shape(&self, s: &str) -> bool {
        let date_part = if self.with_time {
            match s.split_once(' ') {
                Some((date, time)) if is_time_shape(time) => date,
                _ => return false,
            }
        } else {
            s
        };

        let tokens: Vec<&str> = date_part.split(self.separator).collect();
        if tokens.len() != 3 || !tokens.iter().all(|t| !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit())) {
            return false;
        }

        let (year, day_month) = match self.order {
            DateOrder::YearFirst => (tokens[0], [tokens[1], tokens[2]]),
            DateOrder::DayFirst => (tokens[2], [tokens[0], tokens[1]]),
        };

        year.len() == self.year_digits && day_month.iter().all(|t| t.len() <= 2)
    }

    /// Parse the text with this format only
    #[must_use]
    pub fn parse(&self, s: &str) -> Option<NaiveDate> {
        if !self.matches_shape(s) {
            return None;
        }

        if self.with_time {
            NaiveDateTime::parse_from_str(s, self.pattern)
                .ok()
                .map(|dt| dt.date())
        } else {
            NaiveDate::parse_from_str(s, self.pattern).ok()
        }
    }
}

fn is_time_shape(s: &str) -> bool {
    let tokens: Vec<&str> = s.split(':').collect();
    tokens.len() == 3
        && tokens
            .iter()
            .all(|t| (1..=2).contains(&t.len()) && t.bytes().all(|b| b.is_ascii_digit()))
}

/// Parse a date string with the candidate formats, first match wins
#[must_use]
pub fn parse_date_string(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    DATE_CASCADE.iter().find_map(|format| format.parse(s))
}

/// The candidate format that parses the text, for diagnostics
#[must_use]
pub fn detect_date_format(s: &str) -> Option<&'static DateFormat> {
    let s = s.trim();
    DATE_CASCADE.iter().find(|format| format.parse(s).is_some())
}

/// Render a date in the canonical `DD/MM/YYYY` form
#[must_use]
pub fn format_canonical(date: NaiveDate) -> String {
    date.format(CANONICAL_DATE_FORMAT).to_string()
}

/// Whether the text is exactly `DD/MM/YYYY` with a four-digit year
#[must_use]
pub fn is_canonical(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && bytes[2] == b'/'
        && bytes[5] == b'/'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 2 || i == 5 || b.is_ascii_digit())
        && NaiveDate::parse_from_str(s, CANONICAL_DATE_FORMAT).is_ok()
}

/// Convert days since the Unix epoch to a date
#[must_use]
pub fn date32_to_naive(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

/// Convert a date to days since the Unix epoch
#[must_use]
pub fn naive_to_date32(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Parse every value of a string array into dates
#[must_use]
pub fn parse_date_array(array: &StringArray) -> Vec<Option<NaiveDate>> {
    array.iter().map(|v| v.and_then(parse_date_string)).collect()
}

/// Convert an already-typed date or timestamp array into dates
pub fn temporal_to_dates(array: &ArrayRef) -> Result<Vec<Option<NaiveDate>>> {
    let days = if array.data_type() == &DataType::Date32 {
        Arc::clone(array)
    } else {
        cast(array, &DataType::Date32)?
    };

    Ok(days
        .as_primitive::<Date32Type>()
        .iter()
        .map(|v| v.and_then(date32_to_naive))
        .collect())
}

/// Render dates in the canonical form
#[must_use]
pub fn format_dates(dates: &[Option<NaiveDate>]) -> StringArray {
    dates
        .iter()
        .map(|d| d.map(format_canonical))
        .collect()
}
