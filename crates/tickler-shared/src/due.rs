//! Due-string parsing.
//!
//! The core only depends on the [`DueParser`] trait; [`BasicDueParser`] is a
//! small built-in grammar covering the phrases people actually type:
//!
//! - instants: `now`, `in 3 hours`, `in a day`, `today`, `tonight`,
//!   `tomorrow at 5pm`, `friday 9:30`, `next monday`, `at 17:30`,
//!   `2026-10-19`, `2026-10-19 17:30`, RFC 3339
//! - repetitions: `daily`, `hourly`, `every day at 7am`, `every morning`,
//!   `every 2 hours`, `every other week`, `every monday and friday at 9:30`,
//!   `every weekday`, `every month`, `every year`
//! - raw descriptors: `RRULE:...` with or without a `DTSTART:` line
//!
//! Wall-clock phrases are read in the caller's offset.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone, Timelike, Utc, Weekday,
};

use crate::error::ParseError;
use crate::models::Due;
use crate::recurrence::{stamp, Frequency, Recurrence, RepeatRule};
use crate::value::Timestamp;

/// Turns user text into a due specification.
pub trait DueParser: Send + Sync {
    fn parse(&self, text: &str, offset: FixedOffset, now: DateTime<Utc>) -> Result<Due, ParseError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BasicDueParser;

impl DueParser for BasicDueParser {
    fn parse(&self, text: &str, offset: FixedOffset, now: DateTime<Utc>) -> Result<Due, ParseError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ParseError::Empty);
        }

        if is_descriptor(trimmed) {
            return Ok(Due::Recurring(Recurrence::parse(trimmed, offset, now)?));
        }
        if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Due::At(Timestamp::new(instant)?));
        }

        let normalized = trimmed.to_lowercase().replace(',', " ");
        let words: Vec<&str> = normalized.split_whitespace().collect();
        let local_now = now.with_timezone(&offset);

        if let Some(rule) = parse_repetition(&words) {
            return Ok(Due::Recurring(Recurrence::from_rule(stamp(now, offset), rule)?));
        }
        if let Some(local) = parse_instant(&words, local_now) {
            return Ok(Due::At(Timestamp::new(local)?));
        }

        Err(ParseError::Unrecognized(trimmed.to_string()))
    }
}

fn is_descriptor(text: &str) -> bool {
    let upper = text.to_ascii_uppercase();
    upper.starts_with("DTSTART") || upper.starts_with("RRULE:") || upper.starts_with("FREQ=")
}

fn truncate_to_minute(dt: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    dt.with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

// ---------------------------------------------------------------------------
// Repetitions
// ---------------------------------------------------------------------------

fn parse_repetition(words: &[&str]) -> Option<RepeatRule> {
    let (body, time) = split_time(words)?;

    let rule = match body.as_slice() {
        ["daily"] | ["every", "day"] => RepeatRule::new(Frequency::Daily),
        ["hourly"] | ["every", "hour"] => RepeatRule::new(Frequency::Hourly),
        ["weekly"] | ["every", "week"] => RepeatRule::new(Frequency::Weekly),
        ["monthly"] | ["every", "month"] => RepeatRule::new(Frequency::Monthly),
        ["yearly"] | ["annually"] | ["every", "year"] => RepeatRule::new(Frequency::Yearly),
        ["every", "minute"] => RepeatRule::new(Frequency::Minutely),
        ["every", "morning"] => RepeatRule::new(Frequency::Daily).at(8, 0),
        ["every", "afternoon"] => RepeatRule::new(Frequency::Daily).at(13, 0),
        ["every", "evening"] => RepeatRule::new(Frequency::Daily).at(18, 0),
        ["every", "night"] => RepeatRule::new(Frequency::Daily).at(21, 0),
        ["every", "weekday"] => RepeatRule::new(Frequency::Weekly).on_days([
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ]),
        ["every", "weekend"] => {
            RepeatRule::new(Frequency::Weekly).on_days([Weekday::Sat, Weekday::Sun])
        }
        ["every", "other", unit] => RepeatRule::new(frequency_unit(unit)?).every(2),
        ["every", amount, unit] if amount.parse::<u32>().is_ok() => {
            let n = amount.parse::<u32>().ok()?;
            if n == 0 {
                return None;
            }
            RepeatRule::new(frequency_unit(unit)?).every(n)
        }
        ["every", days @ ..] if !days.is_empty() => {
            let days = days
                .iter()
                .filter(|w| **w != "and")
                .map(|w| weekday_name(w))
                .collect::<Option<Vec<_>>>()?;
            RepeatRule::new(Frequency::Weekly).on_days(days)
        }
        _ => return None,
    };

    match time {
        None => Some(rule),
        Some(_) if matches!(rule.freq, Frequency::Minutely | Frequency::Hourly) => None,
        Some(t) => Some(rule.at(t.hour(), t.minute())),
    }
}

fn frequency_unit(word: &str) -> Option<Frequency> {
    match word.strip_suffix('s').unwrap_or(word) {
        "minute" | "min" => Some(Frequency::Minutely),
        "hour" | "hr" => Some(Frequency::Hourly),
        "day" => Some(Frequency::Daily),
        "week" => Some(Frequency::Weekly),
        "month" => Some(Frequency::Monthly),
        "year" => Some(Frequency::Yearly),
        _ => None,
    }
}

fn weekday_name(word: &str) -> Option<Weekday> {
    let singular = word
        .strip_suffix('s')
        .filter(|w| w.ends_with("day"))
        .unwrap_or(word);
    singular.parse::<Weekday>().ok()
}

// ---------------------------------------------------------------------------
// Instants
// ---------------------------------------------------------------------------

fn parse_instant(
    words: &[&str],
    local_now: DateTime<FixedOffset>,
) -> Option<DateTime<FixedOffset>> {
    let (body, time) = split_time(words)?;
    let offset = *local_now.offset();
    let today = local_now.date_naive();
    let now_time = truncate_to_minute(local_now).time();

    let (date, time) = match body.as_slice() {
        ["now"] if time.is_none() => return Some(local_now),
        ["in", amount, unit] if time.is_none() => return shift(local_now, amount, unit),
        [] => {
            let t = time?;
            let date = if t > local_now.time() {
                today
            } else {
                today.succ_opt()?
            };
            (date, t)
        }
        ["today"] => (today, time.unwrap_or(now_time)),
        ["tonight"] => (today, time.unwrap_or(NaiveTime::from_hms_opt(20, 0, 0)?)),
        ["tomorrow"] => (today.succ_opt()?, time.unwrap_or(now_time)),
        ["next", day] | ["on", "next", day] => {
            let t = time.unwrap_or(now_time);
            (next_weekday(today, weekday_name(day)?, true, t, now_time), t)
        }
        [day] | ["on", day] if weekday_name(day).is_some() => {
            let t = time.unwrap_or(now_time);
            (next_weekday(today, weekday_name(day)?, false, t, now_time), t)
        }
        [single] => {
            if let Some(naive) = parse_local_datetime(single) {
                if time.is_some() {
                    return None;
                }
                return offset.from_local_datetime(&naive).single();
            }
            let date = NaiveDate::parse_from_str(single, "%Y-%m-%d").ok()?;
            (date, time.unwrap_or(NaiveTime::MIN))
        }
        _ => return None,
    };

    offset.from_local_datetime(&date.and_time(time)).single()
}

fn shift(
    local_now: DateTime<FixedOffset>,
    amount: &str,
    unit: &str,
) -> Option<DateTime<FixedOffset>> {
    let n: i64 = match amount {
        "a" | "an" | "one" => 1,
        other => other.parse().ok()?,
    };
    match unit.strip_suffix('s').unwrap_or(unit) {
        "second" | "sec" => local_now.checked_add_signed(Duration::try_seconds(n)?),
        "minute" | "min" => local_now.checked_add_signed(Duration::try_minutes(n)?),
        "hour" | "hr" => local_now.checked_add_signed(Duration::try_hours(n)?),
        "day" => local_now.checked_add_signed(Duration::try_days(n)?),
        "week" => local_now.checked_add_signed(Duration::try_weeks(n)?),
        "month" => local_now.checked_add_months(Months::new(u32::try_from(n).ok()?)),
        "year" => local_now.checked_add_months(Months::new(u32::try_from(n).ok()?.checked_mul(12)?)),
        _ => None,
    }
}

/// Date of the next `day`.  Today qualifies unless `strict`, or unless
/// `time` has already passed.
fn next_weekday(
    today: NaiveDate,
    day: Weekday,
    strict: bool,
    time: NaiveTime,
    now_time: NaiveTime,
) -> NaiveDate {
    let ahead =
        (7 + day.num_days_from_monday() - today.weekday().num_days_from_monday()) % 7;
    let ahead = if ahead == 0 && (strict || time <= now_time) {
        7
    } else {
        ahead
    };
    today + Duration::days(i64::from(ahead))
}

fn parse_local_datetime(word: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(word, f).ok())
}

// ---------------------------------------------------------------------------
// Times of day
// ---------------------------------------------------------------------------

/// Split off a trailing time of day: `... at 5 pm`, `... 17:30`, `... 9am`.
///
/// Returns `None` when an `at` is present but is not followed by a time.
fn split_time<'a>(words: &[&'a str]) -> Option<(Vec<&'a str>, Option<NaiveTime>)> {
    if let Some(i) = words.iter().position(|w| *w == "at") {
        let time = parse_clock(&words[i + 1..].concat())?;
        return Some((words[..i].to_vec(), Some(time)));
    }

    let n = words.len();
    if n >= 2 && matches!(words[n - 1], "am" | "pm" | "a.m." | "p.m.") {
        if let Some(time) = parse_clock(&words[n - 2..].concat()) {
            return Some((words[..n - 2].to_vec(), Some(time)));
        }
    }
    if let Some(last) = words.last() {
        if looks_like_clock(last) {
            if let Some(time) = parse_clock(last) {
                return Some((words[..n - 1].to_vec(), Some(time)));
            }
        }
    }
    Some((words.to_vec(), None))
}

fn looks_like_clock(word: &str) -> bool {
    matches!(word, "noon" | "midnight")
        || word.ends_with("am")
        || word.ends_with("pm")
        || (word.contains(':') && !word.contains('-'))
}

fn parse_clock(text: &str) -> Option<NaiveTime> {
    let text = text.trim().replace('.', "");
    match text.as_str() {
        "noon" => return NaiveTime::from_hms_opt(12, 0, 0),
        "midnight" => return NaiveTime::from_hms_opt(0, 0, 0),
        _ => {}
    }

    let (digits, pm) = if let Some(d) = text.strip_suffix("am") {
        (d, Some(false))
    } else if let Some(d) = text.strip_suffix("pm") {
        (d, Some(true))
    } else {
        (text.as_str(), None)
    };

    let (hour, minute) = match digits.split_once(':') {
        Some((h, m)) if m.len() == 2 => (h.parse::<u32>().ok()?, m.parse::<u32>().ok()?),
        Some(_) => return None,
        None => (digits.parse::<u32>().ok()?, 0),
    };

    let hour = match pm {
        Some(pm) if (1..=12).contains(&hour) => hour % 12 + if pm { 12 } else { 0 },
        Some(_) => return None,
        None => hour,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}
