//! Date tokens as numeric values.
//!
//! Dates are stored in numeric datasets as seconds relative to
//! 2009-01-01T00:00:00 (UTC). Accepted forms:
//!
//! ```text
//! 2010-03-01
//! 2010-03-01T12:30
//! 2010-03-01 12:30:15.25
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

static DATE_RE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"^\s*(\d{1,4})-(\d{1,2})-(\d{1,2})(?:[ T]+(\d{1,2}):(\d{1,2})(?::(\d{1,2}(?:\.\d*)?))?)?\s*$",
    )
    .ok()
});

/// The zero point of the date scale.
pub fn date_offset() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2009, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Parse a date string into seconds since [`date_offset`].
///
/// Returns `None` when the token is not a date or names an impossible
/// calendar day.
pub fn date_string_to_date(token: &str) -> Option<f64> {
    let caps = DATE_RE.as_ref()?.captures(token)?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, num(2)?, num(3)?)?;

    let hour = num(4).unwrap_or(0);
    let minute = num(5).unwrap_or(0);
    let seconds: f64 = match caps.get(6) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0.0,
    };
    if seconds >= 60.0 {
        return None;
    }
    let datetime = date.and_hms_opt(hour, minute, 0)?;

    let whole = (datetime - date_offset()).num_seconds() as f64;
    Some(whole + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_is_zero() {
        assert_eq!(date_string_to_date("2009-01-01"), Some(0.0));
    }

    #[test]
    fn test_date_and_time() {
        assert_eq!(date_string_to_date("2009-01-02"), Some(86_400.0));
        assert_eq!(date_string_to_date("2009-01-01T01:00"), Some(3_600.0));
        assert_eq!(date_string_to_date(" 2009-01-01 00:00:01.5 "), Some(1.5));
        assert_eq!(date_string_to_date("2008-12-31"), Some(-86_400.0));
    }

    #[test]
    fn test_rejects_non_dates() {
        for token in ["", "x", "1.5", "2009-02-30", "2009-13-01", "2009-01-01T25:00", "01/02/2009"] {
            assert_eq!(date_string_to_date(token), None, "token {token:?}");
        }
    }
}
