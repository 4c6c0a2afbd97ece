use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

const MONTHS: [&str; 12] = [
  "gennaio",
  "febbraio",
  "marzo",
  "aprile",
  "maggio",
  "giugno",
  "luglio",
  "agosto",
  "settembre",
  "ottobre",
  "novembre",
  "dicembre",
];

// "T" joins date and time in ISO 8601, "Z" ends a UTC time
static TIME_REGEX: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"(?:\b|T)(\d{1,2}):(\d{2})(?::(\d{2}))?(?:\b|Z)").unwrap()
});

static ISO_DATE_REGEX: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap());

static NUMERIC_DATE_REGEX: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").unwrap());

static TOKEN_REGEX: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"\p{L}+|\d+").unwrap());

/// Parses the loosely formatted dates the Il Post API returns, e.g.
/// `"Lun 14 Ott 2024"` or `"14 ottobre 2024 07:00"`. The result is
/// interpreted as UTC.
pub fn parse_italian_date(input: &str) -> Option<DateTime<Utc>> {
  let time = TIME_REGEX
    .captures(input)
    .and_then(|c| {
      let h = c[1].parse().ok()?;
      let m = c[2].parse().ok()?;
      let s = c.get(3).map_or(Some(0), |s| s.as_str().parse().ok())?;
      NaiveTime::from_hms_opt(h, m, s)
    })
    .unwrap_or_default();
  let rest = TIME_REGEX.replace_all(input, " ");

  let date = parse_iso(&rest)
    .or_else(|| parse_numeric(&rest))
    .or_else(|| parse_words(&rest))?;

  Some(Utc.from_utc_datetime(&date.and_time(time)))
}

fn parse_iso(s: &str) -> Option<NaiveDate> {
  let c = ISO_DATE_REGEX.captures(s)?;
  NaiveDate::from_ymd_opt(
    c[1].parse().ok()?,
    c[2].parse().ok()?,
    c[3].parse().ok()?,
  )
}

fn parse_numeric(s: &str) -> Option<NaiveDate> {
  let c = NUMERIC_DATE_REGEX.captures(s)?;
  NaiveDate::from_ymd_opt(
    c[3].parse().ok()?,
    c[2].parse().ok()?,
    c[1].parse().ok()?,
  )
}

fn parse_words(s: &str) -> Option<NaiveDate> {
  let mut day = None;
  let mut month = None;
  let mut year = None;

  for token in TOKEN_REGEX.find_iter(s).map(|m| m.as_str()) {
    if token.chars().all(|c| c.is_ascii_digit()) {
      match token.len() {
        4 if year.is_none() => year = token.parse::<i32>().ok(),
        1 | 2 if day.is_none() => day = token.parse::<u32>().ok(),
        _ => {}
      }
    } else if let Some(m) = month_number(token) {
      // "Mar" is both martedì and marzo; the month follows the weekday,
      // so the last candidate wins.
      month = Some(m);
    }
  }

  NaiveDate::from_ymd_opt(year?, month?, day?)
}

fn month_number(token: &str) -> Option<u32> {
  let token = token.to_lowercase();
  if token.chars().count() < 3 || is_weekday(&token) {
    return None;
  }

  MONTHS
    .iter()
    .position(|name| name.starts_with(&token))
    .map(|i| i as u32 + 1)
}

fn is_weekday(token: &str) -> bool {
  token.ends_with("dì")
    || token.ends_with("di")
    || token == "sabato"
    || token == "domenica"
}
