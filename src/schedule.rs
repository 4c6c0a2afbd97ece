use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};

use crate::{Error, Result};

/// When the feeds get rebuilt unless the config says otherwise.
pub const DEFAULT_SCHEDULES: [&str; 2] =
  ["10 7 * * MON-SAT", "00 6 * * MON-FRI"];

const MONTH_NAMES: [&str; 12] = [
  "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV",
  "DEC",
];
const DAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

// how far ahead next_after looks before giving up, e.g. on "0 0 31 2 *"
const SEARCH_DAYS: u32 = 366 * 5;

/// A five-field cron expression (minute, hour, day of month, month, day of
/// week), evaluated in UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
  expr: String,
  minutes: u64,
  hours: u64,
  days_of_month: u64,
  months: u64,
  days_of_week: u64,
  dom_restricted: bool,
  dow_restricted: bool,
}

impl FromStr for CronSchedule {
  type Err = Error;

  fn from_str(expr: &str) -> Result<Self> {
    let invalid = |reason| Error::Cron(expr.to_owned(), reason);

    let fields: Vec<_> = expr.split_whitespace().collect();
    let [minute, hour, dom, month, dow] = fields[..] else {
      return Err(invalid("expected 5 fields"));
    };

    let mut days_of_week = parse_field(dow, 0, 7, &DAY_NAMES).map_err(invalid)?;
    // 7 is another name for sunday
    if days_of_week & (1 << 7) != 0 {
      days_of_week = (days_of_week & !(1 << 7)) | 1;
    }

    Ok(Self {
      expr: expr.to_owned(),
      minutes: parse_field(minute, 0, 59, &[]).map_err(invalid)?,
      hours: parse_field(hour, 0, 23, &[]).map_err(invalid)?,
      days_of_month: parse_field(dom, 1, 31, &[]).map_err(invalid)?,
      months: parse_field(month, 1, 12, &MONTH_NAMES).map_err(invalid)?,
      days_of_week,
      dom_restricted: !dom.starts_with('*'),
      dow_restricted: !dow.starts_with('*'),
    })
  }
}

impl fmt::Display for CronSchedule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.expr)
  }
}

impl CronSchedule {
  /// The first matching minute strictly after `after`.
  pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let start = after
      .with_second(0)?
      .with_nanosecond(0)?
      .checked_add_signed(Duration::minutes(1))?;

    let mut date = start.date_naive();
    for _ in 0..SEARCH_DAYS {
      if self.matches_day(date) {
        let first_day = date == start.date_naive();
        let min_hour = if first_day { start.hour() } else { 0 };

        for hour in (min_hour..24).filter(|h| bit(self.hours, *h)) {
          let min_minute = if first_day && hour == start.hour() {
            start.minute()
          } else {
            0
          };

          let minute = (min_minute..60).find(|m| bit(self.minutes, *m));
          if let Some(minute) = minute {
            let naive = date.and_hms_opt(hour, minute, 0)?;
            return Some(Utc.from_utc_datetime(&naive));
          }
        }
      }
      date = date.succ_opt()?;
    }

    None
  }

  fn matches_day(&self, date: NaiveDate) -> bool {
    if !bit(self.months, date.month()) {
      return false;
    }

    let dom = bit(self.days_of_month, date.day());
    let dow = bit(self.days_of_week, date.weekday().num_days_from_sunday());

    // classic cron: when both day fields are restricted either may match
    if self.dom_restricted && self.dow_restricted {
      dom || dow
    } else {
      dom && dow
    }
  }
}

/// The earliest upcoming run across `schedules`, with the schedule that
/// produced it.
pub fn next_run(
  schedules: &[CronSchedule],
  after: DateTime<Utc>,
) -> Option<(DateTime<Utc>, &CronSchedule)> {
  schedules
    .iter()
    .filter_map(|s| s.next_after(after).map(|t| (t, s)))
    .min_by_key(|(t, _)| *t)
}

pub fn parse_schedules<I, S>(exprs: I) -> Result<Vec<CronSchedule>>
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  exprs.into_iter().map(|e| e.as_ref().parse()).collect()
}

fn bit(set: u64, n: u32) -> bool {
  set & (1 << n) != 0
}

fn parse_field(
  field: &str,
  min: u32,
  max: u32,
  names: &[&str],
) -> std::result::Result<u64, &'static str> {
  let mut set = 0u64;

  for part in field.split(',') {
    let (range, step) = match part.split_once('/') {
      Some((range, step)) => {
        let step: u32 = step.parse().map_err(|_| "invalid step")?;
        if step == 0 {
          return Err("step must be positive");
        }
        (range, Some(step))
      }
      None => (part, None),
    };

    let (lo, hi) = match range.split_once('-') {
      _ if range == "*" => (min, max),
      Some((lo, hi)) => (
        parse_value(lo, min, names)?,
        parse_value(hi, min, names)?,
      ),
      // "5/15" runs from 5 to the end of the range
      None if step.is_some() => (parse_value(range, min, names)?, max),
      None => {
        let v = parse_value(range, min, names)?;
        (v, v)
      }
    };

    if lo < min || hi > max {
      return Err("value out of range");
    }
    if lo > hi {
      return Err("range start after range end");
    }

    for v in (lo..=hi).step_by(step.unwrap_or(1) as usize) {
      set |= 1 << v;
    }
  }

  Ok(set)
}

fn parse_value(
  s: &str,
  min: u32,
  names: &[&str],
) -> std::result::Result<u32, &'static str> {
  if let Ok(v) = s.parse() {
    return Ok(v);
  }

  names
    .iter()
    .position(|name| name.eq_ignore_ascii_case(s))
    .map(|i| i as u32 + min)
    .ok_or("invalid value")
}
