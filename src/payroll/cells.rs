//! Parsers for timesheet cells.
//!
//! Cells arrive as text from the CSV export; values the spreadsheet stored
//! as numbers (dates, times of day) arrive in their numeric form.

use chrono::{Duration, NaiveDate, NaiveTime};

/// Day 0 of the spreadsheet date system (serial 1 is 1900-01-01 after the
/// leap-year quirk).
fn excel_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or(NaiveDate::MIN)
}

/// `Site 1` through `Site 20` are roster placeholders, not employees.
pub fn is_site_placeholder(name: &str) -> bool {
    let lower = name.trim().to_lowercase();
    lower
        .strip_prefix("site ")
        .and_then(|n| n.trim().parse::<u32>().ok())
        .is_some_and(|n| (1..=20).contains(&n))
}

/// Date from a serial number, `YYYY-MM-DD`, or `D/M/YY[YY]` (`/`, `-` or `.`).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(serial) = s.parse::<f64>() {
        let days = serial.trunc() as i64;
        if days > 0 {
            return excel_epoch().checked_add_signed(Duration::days(days));
        }
        return None;
    }

    if let Some(date) = s
        .get(..10)
        .and_then(|iso| NaiveDate::parse_from_str(iso, "%Y-%m-%d").ok())
    {
        return Some(date);
    }

    parse_day_month_year(s)
}

fn parse_day_month_year(s: &str) -> Option<NaiveDate> {
    let token = s.split_whitespace().next()?;
    let parts: Vec<&str> = token.split(['/', '-', '.']).collect();
    if parts.len() != 3 {
        return None;
    }
    let digits = |p: &str, min: usize, max: usize| {
        (min..=max).contains(&p.len()) && p.bytes().all(|b| b.is_ascii_digit())
    };
    if !digits(parts[0], 1, 2) || !digits(parts[1], 1, 2) || !digits(parts[2], 2, 4) {
        return None;
    }

    let day: u32 = parts[0].parse().ok()?;
    let month: u32 = parts[1].parse().ok()?;
    let mut year: i32 = parts[2].parse().ok()?;
    if year < 100 {
        year += 2000;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Time of day from a fraction of a day or `H:MM[:SS]` (seconds dropped).
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(fraction) = s.parse::<f64>() {
        if !(0.0..1.0).contains(&fraction) {
            return None;
        }
        let secs = (fraction * 86_400.0).round() as u32;
        return NaiveTime::from_hms_opt(secs / 3600, (secs % 3600) / 60, 0);
    }

    let (hours, minutes) = leading_hh_mm(s)?;
    NaiveTime::from_hms_opt(hours, minutes, 0)
}

/// Minutes from `H:MM` or a plain number of minutes (break, travel).
/// Blank or unreadable is 0.
pub fn parse_minutes(raw: &str) -> i64 {
    let s = raw.trim();
    if let Some((h, m)) = leading_hh_mm(s) {
        return i64::from(h) * 60 + i64::from(m);
    }
    s.parse::<f64>().map(|x| x.trunc() as i64).unwrap_or(0)
}

/// Worked minutes from `H:MM` or decimal hours. Blank or unreadable is 0.
pub fn parse_hours(raw: &str) -> i64 {
    let s = raw.trim();
    if let Some((h, m)) = leading_hh_mm(s) {
        return i64::from(h) * 60 + i64::from(m);
    }
    s.parse::<f64>().map(|x| (x * 60.0).round() as i64).unwrap_or(0)
}

/// Whole number, thousands separators allowed.
pub fn parse_int(raw: &str) -> Option<i64> {
    parse_number(raw).map(|x| x.trunc() as i64)
}

/// Decimal number, thousands separators allowed.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|x| x.is_finite())
}

/// On-call flag: `1`, `yes`, `true`, `y`, or any non-zero number.
pub fn parse_on_call(raw: &str) -> bool {
    let s = raw.trim();
    if matches!(s.to_uppercase().as_str(), "1" | "YES" | "TRUE" | "Y") {
        return true;
    }
    s.parse::<f64>().is_ok_and(|x| x != 0.0)
}

/// `H:MM` or `HH:MM` at the start of the string.
fn leading_hh_mm(s: &str) -> Option<(u32, u32)> {
    let (hours, rest) = s.split_once(':')?;
    if hours.is_empty() || hours.len() > 2 || !hours.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let minutes = rest.get(..2)?;
    if !minutes.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((hours.parse().ok()?, minutes.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_site_placeholder() {
        assert!(is_site_placeholder("Site 1"));
        assert!(is_site_placeholder(" site 20 "));
        assert!(!is_site_placeholder("Site 21"));
        assert!(!is_site_placeholder("Site Office"));
        assert!(!is_site_placeholder("Bland, David"));
    }

    #[test]
    fn test_parse_date_serial() {
        assert_eq!(parse_date("1"), Some(date(1899, 12, 31)));
        assert_eq!(parse_date("46027"), Some(date(2026, 1, 5)));
        assert_eq!(parse_date("46027.5"), Some(date(2026, 1, 5)));
        assert_eq!(parse_date("0"), None);
    }

    #[test]
    fn test_parse_date_text_forms() {
        assert_eq!(parse_date("2026-01-05"), Some(date(2026, 1, 5)));
        assert_eq!(parse_date("2026-01-05 00:00:00"), Some(date(2026, 1, 5)));
        assert_eq!(parse_date("5/1/2026"), Some(date(2026, 1, 5)));
        assert_eq!(parse_date("05-01-26"), Some(date(2026, 1, 5)));
        assert_eq!(parse_date("5.1.2026"), Some(date(2026, 1, 5)));
        assert_eq!(parse_date("31/02/2026"), None);
        assert_eq!(parse_date("Monday"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("0.395833"), Some(time(9, 30)));
        assert_eq!(parse_time("0"), Some(time(0, 0)));
        assert_eq!(parse_time("7:45"), Some(time(7, 45)));
        assert_eq!(parse_time("17:30:00"), Some(time(17, 30)));
        assert_eq!(parse_time("25:00"), None);
        assert_eq!(parse_time("1.5"), None);
        assert_eq!(parse_time(""), None);
    }

    #[test]
    fn test_parse_minutes() {
        assert_eq!(parse_minutes("0:30"), 30);
        assert_eq!(parse_minutes("1:00"), 60);
        assert_eq!(parse_minutes("45"), 45);
        assert_eq!(parse_minutes(""), 0);
        assert_eq!(parse_minutes("n/a"), 0);
    }

    #[test]
    fn test_parse_hours() {
        assert_eq!(parse_hours("03:00"), 180);
        assert_eq!(parse_hours("8:30"), 510);
        assert_eq!(parse_hours("7.5"), 450);
        assert_eq!(parse_hours("00:00"), 0);
        assert_eq!(parse_hours(""), 0);
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_int("1,250"), Some(1250));
        assert_eq!(parse_int("30.9"), Some(30));
        assert_eq!(parse_number("6.5"), Some(6.5));
        assert_eq!(parse_number(" "), None);
        assert_eq!(parse_number("abc"), None);
    }

    #[test]
    fn test_parse_on_call() {
        assert!(parse_on_call("Yes"));
        assert!(parse_on_call("y"));
        assert!(parse_on_call("TRUE"));
        assert!(parse_on_call("1"));
        assert!(!parse_on_call("0"));
        assert!(!parse_on_call("no"));
        assert!(!parse_on_call(""));
    }
}
