use chrono::{
    DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, SecondsFormat, SubsecRound, Utc,
    Weekday,
};

use crate::error::{Error, Result};

/// A calendar window `[start, next)`. Both the first and the last instant
/// of the window's calendar days are inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    next: DateTime<Utc>,
}

impl Window {
    /// The calendar week containing `now`, starting on `week_start`.
    pub fn week_containing(now: DateTime<Utc>, week_start: Weekday) -> Self {
        let today = now.date_naive();
        let offset = days_since(today.weekday(), week_start);
        let first = today - Duration::days(offset);
        Self {
            start: start_of_day(first),
            next: start_of_day(first + Duration::days(7)),
        }
    }

    /// The calendar month containing `now`.
    pub fn month_containing(now: DateTime<Utc>) -> Self {
        let first = first_of_month(now.date_naive());
        let next = first
            .checked_add_months(Months::new(1))
            .unwrap_or(NaiveDate::MAX);
        Self {
            start: start_of_day(first),
            next: start_of_day(next),
        }
    }

    /// The week immediately before this one.
    pub fn previous_week(&self) -> Self {
        Self {
            start: self.start - Duration::days(7),
            next: self.start,
        }
    }

    /// The calendar month immediately before this one.
    pub fn previous_month(&self) -> Self {
        let last_of_prev = self.start.date_naive() - Duration::days(1);
        Self {
            start: start_of_day(first_of_month(last_of_prev)),
            next: self.start,
        }
    }

    /// Last representable millisecond of the window.
    pub fn end(&self) -> DateTime<Utc> {
        self.next - Duration::milliseconds(1)
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t < self.next
    }
}

/// Whole hours from `earlier` to `later`, truncated toward zero.
pub fn hours_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> i64 {
    (later - earlier).num_hours()
}

/// Midnight UTC at the start of `d`.
pub fn start_of_day(d: NaiveDate) -> DateTime<Utc> {
    d.and_time(NaiveTime::MIN).and_utc()
}

pub fn first_of_month(d: NaiveDate) -> NaiveDate {
    d - Duration::days(d.day0() as i64)
}

fn days_since(day: Weekday, week_start: Weekday) -> i64 {
    let d = day.num_days_from_monday() as i64;
    let s = week_start.num_days_from_monday() as i64;
    (d - s).rem_euclid(7)
}

/// UTC calendar date of an instant as `YYYY-MM-DD`.
pub fn date_key(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d").to_string()
}

/// The current instant at stored precision (whole milliseconds).
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Format an instant the way it is stored: RFC 3339, milliseconds, `Z`.
pub fn format_instant(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 instant, or a bare `YYYY-MM-DD` date as midnight UTC.
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(start_of_day)
        .map_err(|_| Error::Parse(format!("invalid timestamp: {s}")))
}

/// Parse a weekday name such as `sun`, `Sunday` or `MON`.
pub fn parse_weekday(s: &str) -> Result<Weekday> {
    s.trim()
        .parse::<Weekday>()
        .map_err(|_| Error::Parse(format!("invalid weekday: {s}")))
}
