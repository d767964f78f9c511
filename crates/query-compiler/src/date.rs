//! Date parsing: ISO-8601-lenient partial dates and relative expressions
//! (spec.md §4.2.1), both expanded to a half-open `[start, end)` range.
//!
//! ISO-8601-lenient dates span the smallest unit mentioned (a bare year
//! spans the whole year, a full timestamp spans one second). Relative `"N
//! units ago"` expressions instead follow the literal two-point formula:
//! `higher = now - N·unit`, `lower = higher - 1·unit`, so the range is
//! exactly one unit wide and ends at the anchor instant itself rather than a
//! calendar boundary.
//!
//! Month/year arithmetic uses `chrono::Months` rather than a fixed
//! 30/365-day approximation, clamping the day-of-month when the target
//! month is shorter (spec.md §4.2.1b).

use std::sync::LazyLock;

use chrono::{DateTime, Days, Months, NaiveDate, TimeZone, Utc};
use regex::Regex;

static ISO_LENIENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^
        (?P<year>\d{4})
        (?:-(?P<month>\d{2})
            (?:-(?P<day>\d{2})
                (?:[T\s](?P<hour>\d{2})
                    (?::(?P<minute>\d{2})
                        (?::(?P<second>\d{2}))?
                    )?
                )?
            )?
        )?
        Z?
        $
        ",
    )
    .expect("static regex is valid")
});

static RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?P<count>\d+)\s*(?P<unit>second|minute|hour|day|week|fortnight|month|year)s?\s+ago\s*$",
    )
    .expect("static regex is valid")
});

/// Parses `raw` as either an ISO-8601-lenient partial date or a relative
/// `"N units ago"` expression, returning the half-open `[start, end)` range
/// it denotes. `now` anchors relative expressions.
pub fn parse(raw: &str, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>), ()> {
    let raw = raw.trim();
    if let Some(caps) = RELATIVE.captures(raw) {
        return parse_relative(&caps, now);
    }
    if let Some(caps) = ISO_LENIENT.captures(raw) {
        return parse_iso_lenient(&caps);
    }
    Err(())
}

fn parse_iso_lenient(caps: &regex::Captures<'_>) -> Result<(DateTime<Utc>, DateTime<Utc>), ()> {
    let year: i32 = caps["year"].parse().map_err(|_| ())?;

    let Some(month_m) = caps.name("month") else {
        let start = ymd_utc(year, 1, 1)?;
        let end = ymd_utc(year + 1, 1, 1)?;
        return Ok((start, end));
    };
    let month: u32 = month_m.as_str().parse().map_err(|_| ())?;

    let Some(day_m) = caps.name("day") else {
        let start = ymd_utc(year, month, 1)?;
        let end = add_months(start, 1);
        return Ok((start, end));
    };
    let day: u32 = day_m.as_str().parse().map_err(|_| ())?;

    let Some(hour_m) = caps.name("hour") else {
        let start = ymd_utc(year, month, day)?;
        let end = start + Days::new(1);
        return Ok((start, end));
    };
    let hour: u32 = hour_m.as_str().parse().map_err(|_| ())?;

    let Some(minute_m) = caps.name("minute") else {
        let start = ymdhms_utc(year, month, day, hour, 0, 0)?;
        let end = start + chrono::Duration::hours(1);
        return Ok((start, end));
    };
    let minute: u32 = minute_m.as_str().parse().map_err(|_| ())?;

    let Some(second_m) = caps.name("second") else {
        let start = ymdhms_utc(year, month, day, hour, minute, 0)?;
        let end = start + chrono::Duration::minutes(1);
        return Ok((start, end));
    };
    let second: u32 = second_m.as_str().parse().map_err(|_| ())?;

    let start = ymdhms_utc(year, month, day, hour, minute, second)?;
    let end = start + chrono::Duration::seconds(1);
    Ok((start, end))
}

/// Subtracts `count` units of `unit` from `dt`, using calendar-aware
/// arithmetic for `month`/`year` (same day-of-month, clamped to month
/// length) and fixed-duration arithmetic otherwise.
fn subtract_unit(dt: DateTime<Utc>, unit: &str, count: u32) -> Result<DateTime<Utc>, ()> {
    Ok(match unit {
        "second" => dt - chrono::Duration::seconds(i64::from(count)),
        "minute" => dt - chrono::Duration::minutes(i64::from(count)),
        "hour" => dt - chrono::Duration::hours(i64::from(count)),
        "day" => dt.checked_sub_days(Days::new(u64::from(count))).ok_or(())?,
        "week" => dt
            .checked_sub_days(Days::new(u64::from(count) * 7))
            .ok_or(())?,
        "fortnight" => dt
            .checked_sub_days(Days::new(u64::from(count) * 14))
            .ok_or(())?,
        "month" => dt.checked_sub_months(Months::new(count)).ok_or(())?,
        "year" => dt
            .checked_sub_months(Months::new(count.saturating_mul(12)))
            .ok_or(())?,
        _ => return Err(()),
    })
}

/// Implements spec.md §4.2.1b's literal two-point formula: `higher = origin
/// - N·unit`, `lower = higher - 1·unit`, range `[lower, higher)`.
fn parse_relative(
    caps: &regex::Captures<'_>,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ()> {
    let count: u32 = caps["count"].parse().map_err(|_| ())?;
    let unit = caps["unit"].to_ascii_lowercase();

    let higher = subtract_unit(now, &unit, count)?;
    let lower = subtract_unit(higher, &unit, 1)?;
    Ok((lower, higher))
}

fn ymd_utc(year: i32, month: u32, day: u32) -> Result<DateTime<Utc>, ()> {
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or(())?;
    Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).ok_or(())?))
}

fn ymdhms_utc(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Result<DateTime<Utc>, ()> {
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or(())?;
    let time = date.and_hms_opt(hour, minute, second).ok_or(())?;
    Ok(Utc.from_utc_datetime(&time))
}

/// Adds `n` calendar months, clamping the day-of-month if the target month
/// is shorter (spec.md §4.2.1b).
fn add_months(dt: DateTime<Utc>, n: u32) -> DateTime<Utc> {
    dt.checked_add_months(Months::new(n)).unwrap_or(dt)
}
