//! Capture timestamps as reported by cameras and phones.
//!
//! Metadata dates come as `YYYY:MM:DD HH:MM:SS`, optionally followed by a
//! fractional second and a numeric UTC offset (`+02:00`). Many files carry no
//! offset at all, so the wall-clock reading is kept separately from the
//! (optional) offset instead of guessing one.

use crate::error::{Error, ErrorKind, Result};
use exn::ResultExt;
use std::fmt;
use std::str::FromStr;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

const BASE: &[BorrowedFormatItem<'_>] = format_description!("[year]:[month]:[day] [hour]:[minute]:[second]");
const FRACTIONAL: &[BorrowedFormatItem<'_>] =
    format_description!("[year]:[month]:[day] [hour]:[minute]:[second].[subsecond]");
const OFFSET: &[BorrowedFormatItem<'_>] = format_description!("[offset_hour sign:mandatory][offset_minute]");
/// Token returned by visual date services.
const COMPACT: &[BorrowedFormatItem<'_>] = format_description!("[year][month][day]_[hour][minute][second]");

/// A wall-clock date-time with nanosecond precision and an optional offset.
///
/// ```
/// use datum_library::Timestamp;
///
/// let ts: Timestamp = "2023:05:01 12:51:23.45+02:00".parse().unwrap();
/// assert_eq!(ts.millisecond(), 450);
/// assert_eq!(ts.offset().map(|o| o.whole_hours()), Some(2));
///
/// let bare: Timestamp = "2023:05:01 12:51:23".parse().unwrap();
/// assert!(bare.offset().is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    local: PrimitiveDateTime,
    offset: Option<UtcOffset>,
}
impl Timestamp {
    pub fn new(local: PrimitiveDateTime, offset: Option<UtcOffset>) -> Self {
        Self { local, offset }
    }

    /// Parse the compact `YYYYMMDD_HHMMSS` token returned by visual date
    /// services.
    pub fn parse_compact(s: &str) -> Result<Self> {
        let local = PrimitiveDateTime::parse(s.trim(), COMPACT).or_raise(|| ErrorKind::Timestamp(s.to_string()))?;
        Ok(Self { local, offset: None })
    }

    pub fn local(&self) -> PrimitiveDateTime {
        self.local
    }

    pub fn offset(&self) -> Option<UtcOffset> {
        self.offset
    }

    /// Fractional second truncated (not rounded) to milliseconds.
    pub fn millisecond(&self) -> u16 {
        self.local.millisecond()
    }

    /// Shift the wall-clock reading, keeping the offset.
    pub fn checked_add(self, duration: Duration) -> Option<Self> {
        Some(Self {
            local: self.local.checked_add(duration)?,
            ..self
        })
    }

    /// The timestamp as an [`OffsetDateTime`], assuming UTC when no offset
    /// is known. Used for formatting only.
    pub fn assume_utc_if_naive(&self) -> OffsetDateTime {
        self.local.assume_offset(self.offset.unwrap_or(UtcOffset::UTC))
    }
}

impl FromStr for Timestamp {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (local, offset) = split_offset(trimmed);
        let format = if local.contains('.') { FRACTIONAL } else { BASE };
        let local = PrimitiveDateTime::parse(local, format).or_raise(|| ErrorKind::Timestamp(s.to_string()))?;
        let offset = match offset {
            Some(offset) => {
                let mut digits = offset.replace(':', "");
                // `+02` is as good as `+0200`.
                if digits.len() == 3 {
                    digits.push_str("00");
                }
                Some(UtcOffset::parse(&digits, OFFSET).or_raise(|| ErrorKind::Timestamp(s.to_string()))?)
            },
            None => None,
        };
        Ok(Self { local, offset })
    }
}

impl From<OffsetDateTime> for Timestamp {
    fn from(datetime: OffsetDateTime) -> Self {
        Self {
            local: PrimitiveDateTime::new(datetime.date(), datetime.time()),
            offset: Some(datetime.offset()),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.local)?;
        if let Some(offset) = self.offset {
            write!(f, " {offset}")?;
        }
        Ok(())
    }
}

/// Dates use `:` between fields, so the only sign in the string belongs to
/// the offset.
fn split_offset(s: &str) -> (&str, Option<&str>) {
    match s.rfind(['+', '-']) {
        Some(index) if index > 0 => (&s[..index], Some(&s[index..])),
        _ => (s, None),
    }
}
