//! Recurrence descriptors and the occurrence evaluator.
//!
//! A [`Recurrence`] is a repeat rule (a subset of RFC 5545 `RRULE`) bound to
//! an explicit anchor (`DTSTART`) carrying a fixed UTC offset.  The anchor is
//! stamped once, when the descriptor is first parsed in a profile's time
//! zone, and is always written back with its offset, so evaluating the same
//! descriptor later, anywhere, gives the same occurrences.
//!
//! Text form:
//!
//! ```text
//! DTSTART:20261019T070000+0800
//! RRULE:FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE;BYHOUR=7;BYMINUTE=30
//! ```
//!
//! Supported parts: `FREQ` (MINUTELY..YEARLY), `INTERVAL`, `BYDAY` (plain
//! weekdays), `BYMONTHDAY` (1-31), `BYHOUR`, `BYMINUTE`, `COUNT`, `UNTIL`.
//! `WKST` is accepted and ignored (weeks start on Monday).
//!
//! Occurrences are expanded by the `rrule` crate on the anchor's wall clock,
//! at whole-second precision.  The anchor itself is never an occurrence a
//! task can fall due at: the first due occurrence is the first one strictly
//! after it.

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone, Timelike, Utc, Weekday,
};
use rrule::{RRuleSet, Tz};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::value::RecurrenceText;

const ANCHOR_FORMAT: &str = "%Y%m%dT%H%M%S";
const ANCHOR_FORMAT_WITH_OFFSET: &str = "%Y%m%dT%H%M%S%z";

/// Repetition unit of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    fn as_rrule(self) -> &'static str {
        match self {
            Self::Minutely => "MINUTELY",
            Self::Hourly => "HOURLY",
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }

    fn unit(self) -> &'static str {
        match self {
            Self::Minutely => "minute",
            Self::Hourly => "hour",
            Self::Daily => "day",
            Self::Weekly => "week",
            Self::Monthly => "month",
            Self::Yearly => "year",
        }
    }
}

impl FromStr for Frequency {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MINUTELY" => Ok(Self::Minutely),
            "HOURLY" => Ok(Self::Hourly),
            "DAILY" => Ok(Self::Daily),
            "WEEKLY" => Ok(Self::Weekly),
            "MONTHLY" => Ok(Self::Monthly),
            "YEARLY" => Ok(Self::Yearly),
            other => Err(ParseError::Rule(format!("unsupported FREQ \"{other}\""))),
        }
    }
}

/// The structured repeat rule, without its anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatRule {
    pub freq: Frequency,
    pub interval: u32,
    pub by_day: Vec<Weekday>,
    pub by_month_day: Vec<u32>,
    pub by_hour: Vec<u32>,
    pub by_minute: Vec<u32>,
    pub count: Option<u32>,
    pub until: Option<DateTime<Utc>>,
}

impl RepeatRule {
    pub fn new(freq: Frequency) -> Self {
        Self {
            freq,
            interval: 1,
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            by_hour: Vec::new(),
            by_minute: Vec::new(),
            count: None,
            until: None,
        }
    }

    pub fn every(mut self, interval: u32) -> Self {
        self.interval = interval.max(1);
        self
    }

    pub fn on_days(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.by_day = days.into_iter().collect();
        normalize_weekdays(&mut self.by_day);
        self
    }

    pub fn at(mut self, hour: u32, minute: u32) -> Self {
        self.by_hour = vec![hour];
        self.by_minute = vec![minute];
        self
    }

    /// Parse the value of an `RRULE:` line.  `offset` resolves a floating
    /// `UNTIL`.
    fn parse(value: &str, offset: FixedOffset) -> Result<Self, ParseError> {
        let mut freq = None;
        let mut rule = RepeatRule::new(Frequency::Daily);

        for part in value.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, val) = part
                .split_once('=')
                .ok_or_else(|| ParseError::Rule(format!("malformed part \"{part}\"")))?;
            match key.trim().to_ascii_uppercase().as_str() {
                "FREQ" => freq = Some(val.parse::<Frequency>()?),
                "INTERVAL" => {
                    let n = parse_number(key, val)?;
                    if n == 0 {
                        return Err(ParseError::Rule("INTERVAL must be at least 1".into()));
                    }
                    rule.interval = n;
                }
                "BYDAY" => {
                    rule.by_day = val
                        .split(',')
                        .map(parse_weekday)
                        .collect::<Result<_, _>>()?;
                    normalize_weekdays(&mut rule.by_day);
                }
                "BYMONTHDAY" => rule.by_month_day = parse_list(key, val, 1, 31)?,
                "BYHOUR" => rule.by_hour = parse_list(key, val, 0, 23)?,
                "BYMINUTE" => rule.by_minute = parse_list(key, val, 0, 59)?,
                "COUNT" => {
                    let n = parse_number(key, val)?;
                    if n == 0 {
                        return Err(ParseError::Rule("COUNT must be at least 1".into()));
                    }
                    rule.count = Some(n);
                }
                "UNTIL" => rule.until = Some(parse_until(val, offset)?),
                "WKST" => {}
                other => {
                    return Err(ParseError::Rule(format!("unsupported part \"{other}\"")));
                }
            }
        }

        rule.freq = freq.ok_or_else(|| ParseError::Rule("FREQ is required".into()))?;
        if rule.count.is_some() && rule.until.is_some() {
            return Err(ParseError::Rule("COUNT and UNTIL are mutually exclusive".into()));
        }
        Ok(rule)
    }
}

impl fmt::Display for RepeatRule {
    /// The canonical `RRULE` value (without the `RRULE:` prefix).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FREQ={}", self.freq.as_rrule())?;
        if self.interval != 1 {
            write!(f, ";INTERVAL={}", self.interval)?;
        }
        if !self.by_day.is_empty() {
            let days: Vec<_> = self.by_day.iter().map(|d| weekday_code(*d)).collect();
            write!(f, ";BYDAY={}", days.join(","))?;
        }
        if !self.by_month_day.is_empty() {
            write!(f, ";BYMONTHDAY={}", join_numbers(&self.by_month_day))?;
        }
        if !self.by_hour.is_empty() {
            write!(f, ";BYHOUR={}", join_numbers(&self.by_hour))?;
        }
        if !self.by_minute.is_empty() {
            write!(f, ";BYMINUTE={}", join_numbers(&self.by_minute))?;
        }
        if let Some(count) = self.count {
            write!(f, ";COUNT={count}")?;
        }
        if let Some(until) = self.until {
            write!(f, ";UNTIL={}", until.format("%Y%m%dT%H%M%SZ"))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Recurrence
// ---------------------------------------------------------------------------

/// An anchored recurrence descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Recurrence {
    anchor: DateTime<FixedOffset>,
    rule: RepeatRule,
    text: RecurrenceText,
}

impl Recurrence {
    /// Parse descriptor text typed by a user of a profile at `offset`.
    ///
    /// A `DTSTART` without an offset is read as wall-clock time in `offset`.
    /// A missing `DTSTART` is stamped with [`stamp`]`(now, offset)`.
    pub fn parse(text: &str, offset: FixedOffset, now: DateTime<Utc>) -> Result<Self, ParseError> {
        Self::parse_inner(text, offset, Some(stamp(now, offset)))
    }

    /// Build a descriptor from an already structured rule.  Fails if the
    /// rule cannot be expanded from `anchor`.
    pub fn from_rule(anchor: DateTime<FixedOffset>, rule: RepeatRule) -> Result<Self, ParseError> {
        let anchor = anchor.with_nanosecond(0).unwrap_or(anchor);
        let text = RecurrenceText::new(render(&anchor, &rule))?;
        let recurrence = Self { anchor, rule, text };
        recurrence.rule_set()?;
        Ok(recurrence)
    }

    fn parse_inner(
        text: &str,
        offset: FixedOffset,
        fallback_anchor: Option<DateTime<FixedOffset>>,
    ) -> Result<Self, ParseError> {
        let mut anchor_line = None;
        let mut rule_line = None;

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let upper = line.to_ascii_uppercase();
            if upper.starts_with("DTSTART") {
                anchor_line = Some(line);
            } else if let Some(rest) = strip_prefix_ci(line, "RRULE:") {
                rule_line = Some(rest);
            } else if upper.starts_with("FREQ=") {
                rule_line = Some(line);
            } else {
                return Err(ParseError::Rule(format!("unexpected line \"{line}\"")));
            }
        }

        let anchor = match anchor_line {
            Some(line) => parse_anchor(line, offset)?,
            None => fallback_anchor
                .ok_or_else(|| ParseError::Anchor("DTSTART is required".into()))?,
        };
        let rule_line = rule_line.ok_or_else(|| ParseError::Rule("RRULE is missing".into()))?;
        let rule = RepeatRule::parse(rule_line, *anchor.offset())?;

        Self::from_rule(anchor, rule)
    }

    pub fn anchor(&self) -> DateTime<FixedOffset> {
        self.anchor
    }

    pub fn rule(&self) -> &RepeatRule {
        &self.rule
    }

    /// The canonical serialized form.
    pub fn text(&self) -> &RecurrenceText {
        &self.text
    }

    /// First occurrence strictly after `reference`.
    pub fn after(&self, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.first(reference, false)
    }

    /// First occurrence at or after `reference`.
    pub fn at_or_after(&self, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.first(reference, true)
    }

    /// The occurrence a task is currently due at: the first one strictly
    /// after the later of the anchor and the last completion.
    pub fn current_due(&self, last_done: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        let anchor = self.anchor.with_timezone(&Utc);
        self.after(last_done.map_or(anchor, |done| done.max(anchor)))
    }

    /// Human-readable description, e.g. "every 2 weeks on Mon, Wed at 07:30".
    pub fn describe(&self) -> String {
        let rule = &self.rule;
        let mut out = if rule.interval == 1 {
            format!("every {}", rule.freq.unit())
        } else {
            format!("every {} {}s", rule.interval, rule.freq.unit())
        };

        if rule.freq == Frequency::Yearly && rule.by_month_day.is_empty() {
            out.push_str(&format!(" on {}", self.anchor.format("%b %-d")));
        }
        if !rule.by_day.is_empty() {
            let days: Vec<String> = rule.by_day.iter().map(|d| d.to_string()).collect();
            out.push_str(&format!(" on {}", days.join(", ")));
        }
        if !rule.by_month_day.is_empty() {
            out.push_str(&format!(" on day {}", join_numbers(&rule.by_month_day)));
        } else if rule.freq == Frequency::Monthly && rule.by_day.is_empty() {
            out.push_str(&format!(" on day {}", self.anchor.day()));
        }

        match rule.freq {
            Frequency::Minutely => {
                if !rule.by_hour.is_empty() {
                    out.push_str(&format!(" during hours {}", join_numbers(&rule.by_hour)));
                }
            }
            Frequency::Hourly => {
                let minutes = self.minutes();
                out.push_str(&format!(" at minute {}", join_numbers(&minutes)));
            }
            _ => {
                let times: Vec<String> = self
                    .times()
                    .iter()
                    .map(|t| t.format("%H:%M").to_string())
                    .collect();
                out.push_str(&format!(" at {}", times.join(", ")));
            }
        }

        if let Some(count) = rule.count {
            out.push_str(&format!(", {count} times"));
        }
        if let Some(until) = rule.until {
            let local = until.with_timezone(self.anchor.offset());
            out.push_str(&format!(", until {}", local.format("%Y-%m-%d %H:%M")));
        }
        out
    }

    // -----------------------------------------------------------------
    // Evaluation
    // -----------------------------------------------------------------

    /// The rule expanded on the anchor's wall clock.  Wall-clock times are
    /// written as UTC so the fixed offset never enters the expansion; it is
    /// reapplied to each result.
    fn rule_set(&self) -> Result<RRuleSet, ParseError> {
        let offset = *self.anchor.offset();
        let mut rule = self.rule.clone();
        rule.until = rule
            .until
            .map(|u| Utc.from_utc_datetime(&u.with_timezone(&offset).naive_local()));
        format!(
            "DTSTART:{}Z\nRRULE:{}",
            self.anchor.naive_local().format(ANCHOR_FORMAT),
            rule
        )
        .parse::<RRuleSet>()
        .map_err(|e| ParseError::Rule(e.to_string()))
    }

    fn first(&self, reference: DateTime<Utc>, inclusive: bool) -> Option<DateTime<Utc>> {
        let offset = *self.anchor.offset();
        let wall = Tz::UTC.from_utc_datetime(&reference.with_timezone(&offset).naive_local());

        let found = self
            .rule_set()
            .ok()?
            .after(wall)
            .all(2)
            .dates
            .into_iter()
            .find(|d| if inclusive { *d >= wall } else { *d > wall })?;

        offset
            .from_local_datetime(&found.naive_utc())
            .single()
            .map(|d| d.with_timezone(&Utc))
    }

    fn hours(&self) -> Vec<u32> {
        if self.rule.by_hour.is_empty() {
            vec![self.anchor.hour()]
        } else {
            self.rule.by_hour.clone()
        }
    }

    fn minutes(&self) -> Vec<u32> {
        if self.rule.by_minute.is_empty() {
            vec![self.anchor.minute()]
        } else {
            self.rule.by_minute.clone()
        }
    }

    /// Times of day an occurrence can fall on (daily and coarser rules).
    fn times(&self) -> Vec<NaiveTime> {
        let minutes = self.minutes();
        let mut times: Vec<NaiveTime> = self
            .hours()
            .into_iter()
            .flat_map(|h| minutes.iter().filter_map(move |m| NaiveTime::from_hms_opt(h, *m, 0)))
            .collect();
        times.sort();
        times
    }
}

/// Anchor for a descriptor created at `now`: the first whole minute at or
/// after `now`, on the wall clock of `offset`.
pub fn stamp(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<FixedOffset> {
    let local = now.with_timezone(&offset);
    let floor = local
        .with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(local);
    if floor == local {
        floor
    } else {
        floor + Duration::minutes(1)
    }
}

impl FromStr for Recurrence {
    type Err = ParseError;

    /// Parse canonical descriptor text.  The anchor must be explicit and
    /// carry its own offset (or `Z`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let anchored = s
            .lines()
            .map(str::trim)
            .any(|l| l.to_ascii_uppercase().starts_with("DTSTART") && anchor_has_offset(l));
        if !anchored {
            return Err(ParseError::Anchor(
                "stored descriptors need a DTSTART with an explicit offset".into(),
            ));
        }
        Self::parse_inner(s, Utc.fix(), None)
    }
}

impl TryFrom<String> for Recurrence {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Recurrence> for String {
    fn from(value: Recurrence) -> Self {
        value.text.into()
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text.as_str())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn render(anchor: &DateTime<FixedOffset>, rule: &RepeatRule) -> String {
    format!(
        "DTSTART:{}\nRRULE:{}",
        anchor.format(ANCHOR_FORMAT_WITH_OFFSET),
        rule
    )
}

fn anchor_has_offset(line: &str) -> bool {
    let value = line.rsplit(':').next().unwrap_or_default().trim();
    value.ends_with(['Z', 'z']) || value.contains(['+', '-'])
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

fn parse_anchor(line: &str, offset: FixedOffset) -> Result<DateTime<FixedOffset>, ParseError> {
    let (params, value) = line
        .split_once(':')
        .ok_or_else(|| ParseError::Anchor(format!("malformed line \"{line}\"")))?;
    if params.to_ascii_uppercase().contains("TZID") {
        return Err(ParseError::Anchor(
            "named time zones are not supported, use an offset".into(),
        ));
    }
    let value = value.trim();

    if let Some(utc) = value.strip_suffix('Z').or_else(|| value.strip_suffix('z')) {
        let naive = NaiveDateTime::parse_from_str(utc, ANCHOR_FORMAT)
            .map_err(|e| ParseError::Anchor(format!("\"{value}\": {e}")))?;
        return Ok(Utc.from_utc_datetime(&naive).with_timezone(&offset));
    }
    if let Ok(explicit) = DateTime::parse_from_str(value, ANCHOR_FORMAT_WITH_OFFSET) {
        return Ok(explicit);
    }
    let naive = NaiveDateTime::parse_from_str(value, ANCHOR_FORMAT)
        .map_err(|e| ParseError::Anchor(format!("\"{value}\": {e}")))?;
    offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| ParseError::Anchor(format!("\"{value}\" is not a valid local time")))
}

fn parse_until(value: &str, offset: FixedOffset) -> Result<DateTime<Utc>, ParseError> {
    let value = value.trim();
    if let Some(utc) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(utc, ANCHOR_FORMAT)
            .map_err(|e| ParseError::Rule(format!("UNTIL \"{value}\": {e}")))?;
        return Ok(Utc.from_utc_datetime(&naive));
    }
    let naive = match NaiveDateTime::parse_from_str(value, ANCHOR_FORMAT) {
        Ok(naive) => naive,
        Err(_) => NaiveDate::parse_from_str(value, "%Y%m%d")
            .ok()
            .and_then(|d| d.and_hms_opt(23, 59, 59))
            .ok_or_else(|| ParseError::Rule(format!("UNTIL \"{value}\" is not a date")))?,
    };
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|d| d.with_timezone(&Utc))
        .ok_or_else(|| ParseError::Rule(format!("UNTIL \"{value}\" is not a valid local time")))
}

fn parse_number(key: &str, value: &str) -> Result<u32, ParseError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| ParseError::Rule(format!("{key} expects a number, got \"{value}\"")))
}

fn parse_list(key: &str, value: &str, min: u32, max: u32) -> Result<Vec<u32>, ParseError> {
    let mut out = Vec::new();
    for item in value.split(',') {
        let n = parse_number(key, item)?;
        if n < min || n > max {
            return Err(ParseError::Rule(format!(
                "{key} values must be within {min}..={max}, got {n}"
            )));
        }
        out.push(n);
    }
    out.sort_unstable();
    out.dedup();
    Ok(out)
}

fn parse_weekday(code: &str) -> Result<Weekday, ParseError> {
    match code.trim().to_ascii_uppercase().as_str() {
        "MO" => Ok(Weekday::Mon),
        "TU" => Ok(Weekday::Tue),
        "WE" => Ok(Weekday::Wed),
        "TH" => Ok(Weekday::Thu),
        "FR" => Ok(Weekday::Fri),
        "SA" => Ok(Weekday::Sat),
        "SU" => Ok(Weekday::Sun),
        other => Err(ParseError::Rule(format!(
            "BYDAY value \"{other}\" is not supported (ordinals are not implemented)"
        ))),
    }
}

fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

fn normalize_weekdays(days: &mut Vec<Weekday>) {
    days.sort_by_key(|d| d.num_days_from_monday());
    days.dedup();
}

fn join_numbers(values: &[u32]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn offset(hours: i32) -> FixedOffset {
        FixedOffset::east_opt(hours * 3600).unwrap()
    }

    #[test]
    fn first_due_is_strictly_after_anchor() {
        let rec = Recurrence::parse(
            "DTSTART:20261019T070000\nRRULE:FREQ=DAILY",
            offset(0),
            utc("2026-10-19T06:00:00Z"),
        )
        .unwrap();

        assert_eq!(rec.current_due(None), Some(utc("2026-10-20T07:00:00Z")));
        assert_eq!(
            rec.after(utc("2026-10-19T07:00:00Z")),
            Some(utc("2026-10-20T07:00:00Z"))
        );
        assert_eq!(
            rec.at_or_after(utc("2026-10-19T07:00:00Z")),
            Some(utc("2026-10-19T07:00:00Z"))
        );
    }

    #[test]
    fn stamped_rule_is_not_due_at_creation() {
        let now = utc("2026-10-19T10:00:30Z");
        let rec = Recurrence::parse("RRULE:FREQ=DAILY", offset(0), now).unwrap();

        assert_eq!(rec.anchor().with_timezone(&Utc), utc("2026-10-19T10:01:00Z"));
        let due = rec.current_due(None).unwrap();
        assert!(due > now);
        assert_eq!(due, utc("2026-10-20T10:01:00Z"));

        let exact = Recurrence::parse(
            "RRULE:FREQ=HOURLY;INTERVAL=2",
            offset(0),
            utc("2026-10-19T10:00:00Z"),
        )
        .unwrap();
        assert_eq!(exact.current_due(None), Some(utc("2026-10-19T12:00:00Z")));
    }

    #[test]
    fn floating_anchor_uses_profile_offset() {
        let rec = Recurrence::parse(
            "DTSTART:20261019T070000\nRRULE:FREQ=DAILY",
            offset(8),
            utc("2026-10-18T00:00:00Z"),
        )
        .unwrap();

        // 07:00 at UTC+8 is 23:00 UTC the previous day.
        assert_eq!(rec.current_due(None), Some(utc("2026-10-19T23:00:00Z")));
        assert_eq!(
            rec.at_or_after(utc("2026-10-18T00:00:00Z")),
            Some(utc("2026-10-18T23:00:00Z"))
        );
        assert_eq!(rec.text().as_str(), "DTSTART:20261019T070000+0800\nRRULE:FREQ=DAILY");
    }

    #[test]
    fn serialized_anchor_is_stable_across_offsets() {
        let rec = Recurrence::parse(
            "DTSTART:20261019T070000\nRRULE:FREQ=DAILY",
            offset(-5),
            utc("2026-10-18T00:00:00Z"),
        )
        .unwrap();
        let reparsed: Recurrence = rec.text().as_str().parse().unwrap();
        assert_eq!(reparsed, rec);
        assert_eq!(
            reparsed.after(utc("2026-10-20T00:00:00Z")),
            rec.after(utc("2026-10-20T00:00:00Z"))
        );
    }

    #[test]
    fn missing_anchor_is_stamped_with_now() {
        let now = utc("2026-10-19T10:23:45Z");
        let rec = Recurrence::parse("RRULE:FREQ=DAILY;BYHOUR=7;BYMINUTE=0", offset(0), now).unwrap();

        assert_eq!(rec.anchor().with_timezone(&Utc), utc("2026-10-19T10:24:00Z"));
        // 07:00 today is before the anchor, so tomorrow is the first occurrence.
        assert_eq!(rec.current_due(None), Some(utc("2026-10-20T07:00:00Z")));
    }

    #[test]
    fn stored_text_requires_explicit_offset() {
        assert!("DTSTART:20261019T070000\nRRULE:FREQ=DAILY"
            .parse::<Recurrence>()
            .is_err());
        assert!("RRULE:FREQ=DAILY".parse::<Recurrence>().is_err());
        assert!("DTSTART:20261019T070000Z\nRRULE:FREQ=DAILY"
            .parse::<Recurrence>()
            .is_ok());
        assert!("DTSTART:20261019T070000-0300\nRRULE:FREQ=DAILY"
            .parse::<Recurrence>()
            .is_ok());
    }

    #[test]
    fn weekly_by_day() {
        // 2026-10-19 is a Monday.
        let rec = Recurrence::parse(
            "DTSTART:20261019T093000Z\nRRULE:FREQ=WEEKLY;BYDAY=WE,MO",
            offset(0),
            utc("2026-10-19T00:00:00Z"),
        )
        .unwrap();

        assert_eq!(rec.rule().by_day, vec![Weekday::Mon, Weekday::Wed]);
        assert_eq!(
            rec.after(utc("2026-10-19T09:30:00Z")),
            Some(utc("2026-10-21T09:30:00Z"))
        );
        assert_eq!(
            rec.after(utc("2026-10-21T09:30:00Z")),
            Some(utc("2026-10-26T09:30:00Z"))
        );
    }

    #[test]
    fn biweekly_interval() {
        let rec = Recurrence::parse(
            "DTSTART:20261019T080000Z\nRRULE:FREQ=WEEKLY;INTERVAL=2",
            offset(0),
            utc("2026-10-19T00:00:00Z"),
        )
        .unwrap();
        assert_eq!(
            rec.after(utc("2026-10-19T08:00:00Z")),
            Some(utc("2026-11-02T08:00:00Z"))
        );
        assert_eq!(
            rec.after(utc("2027-01-01T00:00:00Z")),
            Some(utc("2027-01-11T08:00:00Z"))
        );
    }

    #[test]
    fn monthly_skips_short_months() {
        let rec = Recurrence::parse(
            "DTSTART:20260131T120000Z\nRRULE:FREQ=MONTHLY",
            offset(0),
            utc("2026-01-01T00:00:00Z"),
        )
        .unwrap();
        assert_eq!(
            rec.after(utc("2026-01-31T12:00:00Z")),
            Some(utc("2026-03-31T12:00:00Z"))
        );
    }

    #[test]
    fn hourly_far_from_anchor() {
        let rec = Recurrence::parse(
            "DTSTART:20260101T001500Z\nRRULE:FREQ=HOURLY;INTERVAL=3",
            offset(0),
            utc("2026-01-01T00:00:00Z"),
        )
        .unwrap();
        // 2026-10-19T00:15 is 291 days * 24 h after the anchor, a multiple of 3.
        assert_eq!(
            rec.after(utc("2026-10-19T00:20:00Z")),
            Some(utc("2026-10-19T03:15:00Z"))
        );
    }

    #[test]
    fn count_and_until_exhaust() {
        let rec = Recurrence::parse(
            "DTSTART:20261019T070000Z\nRRULE:FREQ=DAILY;COUNT=2",
            offset(0),
            utc("2026-10-19T00:00:00Z"),
        )
        .unwrap();
        assert_eq!(
            rec.after(utc("2026-10-19T07:00:00Z")),
            Some(utc("2026-10-20T07:00:00Z"))
        );
        assert_eq!(rec.after(utc("2026-10-20T07:00:00Z")), None);

        let rec = Recurrence::parse(
            "DTSTART:20261019T070000Z\nRRULE:FREQ=DAILY;UNTIL=20261020T070000Z",
            offset(0),
            utc("2026-10-19T00:00:00Z"),
        )
        .unwrap();
        assert_eq!(
            rec.after(utc("2026-10-19T07:00:00Z")),
            Some(utc("2026-10-20T07:00:00Z"))
        );
        assert_eq!(rec.after(utc("2026-10-20T07:00:00Z")), None);
    }

    #[test]
    fn completion_moves_due_strictly_forward() {
        let rec = Recurrence::parse(
            "DTSTART:20261019T070000Z\nRRULE:FREQ=DAILY",
            offset(0),
            utc("2026-10-19T00:00:00Z"),
        )
        .unwrap();
        let before = rec.current_due(None).unwrap();
        assert_eq!(before, utc("2026-10-20T07:00:00Z"));

        // Completing ahead of the first due occurrence does not move it.
        assert_eq!(rec.current_due(Some(utc("2026-10-19T06:00:00Z"))), Some(before));

        let done_at = utc("2026-10-20T08:15:00Z");
        let after = rec.current_due(Some(done_at)).unwrap();
        assert!(after > before);
        assert_eq!(after, rec.after(done_at).unwrap());
        assert_eq!(after, utc("2026-10-21T07:00:00Z"));
    }

    #[test]
    fn malformed_rules_are_rejected() {
        let now = utc("2026-10-19T00:00:00Z");
        for text in [
            "RRULE:FREQ=FORTNIGHTLY",
            "RRULE:INTERVAL=2",
            "RRULE:FREQ=DAILY;INTERVAL=0",
            "RRULE:FREQ=WEEKLY;BYDAY=1MO",
            "RRULE:FREQ=DAILY;BYHOUR=24",
            "RRULE:FREQ=DAILY;COUNT=2;UNTIL=20261101T000000Z",
            "RRULE:FREQ=DAILY;BYSETPOS=1",
            "DTSTART;TZID=Europe/Paris:20261019T070000\nRRULE:FREQ=DAILY",
            "DTSTART:tomorrow\nRRULE:FREQ=DAILY",
            "hello",
        ] {
            assert!(
                Recurrence::parse(text, offset(0), now).is_err(),
                "{text} should not parse"
            );
        }
    }

    #[test]
    fn describe_reads_naturally() {
        let now = utc("2026-10-19T00:00:00Z");
        let daily = Recurrence::parse("DTSTART:20261019T070000Z\nRRULE:FREQ=DAILY", offset(0), now)
            .unwrap();
        assert_eq!(daily.describe(), "every day at 07:00");

        let weekly = Recurrence::parse(
            "DTSTART:20261019T093000Z\nRRULE:FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE",
            offset(0),
            now,
        )
        .unwrap();
        assert_eq!(weekly.describe(), "every 2 weeks on Mon, Wed at 09:30");

        let hourly =
            Recurrence::parse("DTSTART:20261019T001500Z\nRRULE:FREQ=HOURLY", offset(0), now)
                .unwrap();
        assert_eq!(hourly.describe(), "every hour at minute 15");
    }
}
