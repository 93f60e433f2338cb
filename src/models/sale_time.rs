//! Sale time helpers.
//!
//! The sale time is always carried with an explicit UTC offset. New values
//! default to the Taipei zone (UTC+8, no daylight saving), which is where the
//! ticket site schedules its sales.

use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Timelike, Utc,
};
use thiserror::Error;

/// Taipei Standard Time, UTC+08:00
pub const TAIPEI_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// Accepted local formats for [`parse_sale_time`], tried in order
const LOCAL_FORMATS: [&str; 4] = [
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SaleTimeError {
    #[error("Hour must be between 1 and 12 on a 12-hour clock, got {0}")]
    InvalidHour(u32),

    #[error("Minute must be between 0 and 59, got {0}")]
    InvalidMinute(u32),

    #[error("Second must be between 0 and 59, got {0}")]
    InvalidSecond(u32),

    #[error("Date/time does not exist at offset {0}")]
    NonexistentLocalTime(FixedOffset),

    #[error("Unrecognised sale time '{0}' (expected RFC 3339 or YYYY/MM/DD HH:MM[:SS])")]
    Unparseable(String),
}

pub fn taipei_offset() -> FixedOffset {
    FixedOffset::east_opt(TAIPEI_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Current instant in the Taipei zone, truncated to whole seconds.
pub fn taipei_now() -> DateTime<FixedOffset> {
    let now = Utc::now().with_timezone(&taipei_offset());
    now.with_nanosecond(0).unwrap_or(now)
}

/// Replace the calendar date, keeping time-of-day and offset.
pub fn with_date(
    current: DateTime<FixedOffset>,
    date: NaiveDate,
) -> Result<DateTime<FixedOffset>, SaleTimeError> {
    let offset = *current.offset();
    offset
        .from_local_datetime(&date.and_time(current.time()))
        .single()
        .ok_or(SaleTimeError::NonexistentLocalTime(offset))
}

/// Replace the time-of-day from a 12-hour clock reading, keeping date and offset.
///
/// 12 AM maps to 00 and 12 PM stays 12.
pub fn with_clock_12h(
    current: DateTime<FixedOffset>,
    hour12: u32,
    minute: u32,
    second: u32,
    is_am: bool,
) -> Result<DateTime<FixedOffset>, SaleTimeError> {
    if !(1..=12).contains(&hour12) {
        return Err(SaleTimeError::InvalidHour(hour12));
    }
    if minute > 59 {
        return Err(SaleTimeError::InvalidMinute(minute));
    }
    if second > 59 {
        return Err(SaleTimeError::InvalidSecond(second));
    }

    let hour24 = match (is_am, hour12) {
        (true, 12) => 0,
        (true, h) => h,
        (false, 12) => 12,
        (false, h) => h + 12,
    };

    let offset = *current.offset();
    current
        .date_naive()
        .and_hms_opt(hour24, minute, second)
        .and_then(|local| offset.from_local_datetime(&local).single())
        .ok_or(SaleTimeError::NonexistentLocalTime(offset))
}

/// Parse operator input as RFC 3339, or as a Taipei-local `YYYY/MM/DD HH:MM[:SS]`.
pub fn parse_sale_time(input: &str) -> Result<DateTime<FixedOffset>, SaleTimeError> {
    let input = input.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Ok(parsed);
    }

    let offset = taipei_offset();
    LOCAL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .and_then(|local| offset.from_local_datetime(&local).single())
        .ok_or_else(|| SaleTimeError::Unparseable(input.to_string()))
}

/// `2030/01/31 PM 07:30:00 +08:00`
pub fn display(sale_time: &DateTime<FixedOffset>) -> String {
    sale_time.format("%Y/%m/%d %p %I:%M:%S %:z").to_string()
}
