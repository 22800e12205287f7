use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Utc};

/// Date-only layouts, tried in order. Month-first numeric layouts come before
/// their day-first twins so that `03/04/2024` reads as March 4th; a token such
/// as `13/04/2024` fails month-first and falls through to day-first.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%m.%d.%Y",
    "%d.%m.%Y",
    // %B accepts both "January" and "Jan" when parsing
    "%d-%B-%Y",
    "%d/%B/%Y",
    "%d.%B.%Y",
    "%B-%d-%Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Punctuation that commonly hugs a date inside running text, e.g. `(12/01/2024)`
/// or `dated 12-01-2024,`.
const TRIM_CHARS: &[char] = &['(', ')', '[', ']', '{', '}', ',', ';', ':', '"', '\'', '|'];

/// Parses a single whitespace-free token as a date or date-time.
///
/// Values that carry a zone keep their offset; naive values are taken to be
/// UTC (date-only values at midnight). Returns `None` for anything that is not
/// a complete calendar date: bare years, bare month names and plain numbers
/// are rejected.
///
/// # Examples
///
/// ```
/// use pagefeed::util::parse_date_token;
///
/// let dt = parse_date_token("2024-03-15").unwrap();
/// assert_eq!(dt.to_rfc3339(), "2024-03-15T00:00:00+00:00");
///
/// assert!(parse_date_token("2024").is_none());
/// assert!(parse_date_token("Minutes").is_none());
/// ```
pub fn parse_date_token(token: &str) -> Option<DateTime<FixedOffset>> {
    let token = token.trim_matches(TRIM_CHARS).trim_end_matches('.');
    if !has_four_digit_run(token) {
        return None;
    }

    parse_any(token).filter(|dt| (0..=9999).contains(&dt.year()))
}

fn parse_any(token: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Some(dt);
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(token, fmt) {
            return Some(naive.and_utc().fixed_offset());
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(token, fmt) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|naive| naive.and_utc().fixed_offset());
        }
    }

    None
}

/// Every accepted layout carries a four-digit year; requiring one up front keeps
/// `%Y` from reading tokens like `1/2/3` as the year 1.
fn has_four_digit_run(token: &str) -> bool {
    let mut run = 0;
    for b in token.bytes() {
        run = if b.is_ascii_digit() { run + 1 } else { 0 };
        if run >= 4 {
            return true;
        }
    }
    false
}

/// Returns the first token of `text`, scanning left to right, that parses as a date.
///
/// Tokens are whitespace-delimited. When several tokens look like dates the
/// leftmost always wins, regardless of which is the "better" match.
pub fn sniff_date(text: &str) -> Option<DateTime<FixedOffset>> {
    text.split_whitespace().find_map(parse_date_token)
}

/// Coerces an optional publication date to the value written to the feed:
/// missing dates become `now`.
pub fn or_now(
    date: Option<DateTime<FixedOffset>>,
    now: DateTime<Utc>,
) -> DateTime<FixedOffset> {
    date.unwrap_or_else(|| now.fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn ymd(dt: DateTime<FixedOffset>) -> (i32, u32, u32) {
        (dt.year(), dt.month(), dt.day())
    }

    #[test]
    fn test_iso_date() {
        let dt = parse_date_token("2024-03-15").unwrap();
        assert_eq!(ymd(dt), (2024, 3, 15));
        assert_eq!(dt.offset().local_minus_utc(), 0);
        assert_eq!(dt.hour(), 0);
    }

    #[test]
    fn test_rfc3339_keeps_offset() {
        let dt = parse_date_token("2024-03-15T10:30:00+05:30").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 5 * 3600 + 30 * 60);
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn test_naive_datetime_is_utc() {
        let dt = parse_date_token("2024-03-15T10:30:00").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 0);
        assert_eq!((dt.hour(), dt.minute()), (10, 30));
    }

    #[test]
    fn test_ambiguous_numeric_prefers_month_first() {
        let dt = parse_date_token("03/04/2024").unwrap();
        assert_eq!(ymd(dt), (2024, 3, 4));
    }

    #[test]
    fn test_day_first_when_month_first_impossible() {
        let dt = parse_date_token("25/12/2023").unwrap();
        assert_eq!(ymd(dt), (2023, 12, 25));

        let dt = parse_date_token("25-12-2023").unwrap();
        assert_eq!(ymd(dt), (2023, 12, 25));

        let dt = parse_date_token("25.12.2023").unwrap();
        assert_eq!(ymd(dt), (2023, 12, 25));
    }

    #[test]
    fn test_month_names() {
        assert_eq!(ymd(parse_date_token("05-Jan-2024").unwrap()), (2024, 1, 5));
        assert_eq!(ymd(parse_date_token("05-January-2024").unwrap()), (2024, 1, 5));
        assert_eq!(ymd(parse_date_token("Feb-29-2024").unwrap()), (2024, 2, 29));
    }

    #[test]
    fn test_surrounding_punctuation_trimmed() {
        assert_eq!(ymd(parse_date_token("(2024-01-02)").unwrap()), (2024, 1, 2));
        assert_eq!(ymd(parse_date_token("2024-01-02,").unwrap()), (2024, 1, 2));
        assert_eq!(ymd(parse_date_token("2024-01-02.").unwrap()), (2024, 1, 2));
    }

    #[test]
    fn test_non_dates_rejected() {
        for token in [
            "2024",
            "12",
            "Jan",
            "Minutes",
            "SEC",
            "v1.2",
            "",
            "()",
            "13/13/2024",
            "31/02/2024",
            "1/2/3",
        ] {
            assert!(parse_date_token(token).is_none(), "token {token:?} parsed as a date");
        }
    }

    #[test]
    fn test_years_outside_four_digits_rejected() {
        for token in ["-2024-01-05", "+12024-01-05", "05/01/-2024", "+12024-01-05T10:00:00"] {
            assert!(parse_date_token(token).is_none(), "token {token:?} parsed as a date");
        }
        assert_eq!(ymd(parse_date_token("9999-12-31").unwrap()), (9999, 12, 31));
    }

    #[test]
    fn test_sniff_skips_out_of_range_year() {
        let dt = sniff_date("ref -2024-01-05 uploaded 2024-02-20").unwrap();
        assert_eq!(ymd(dt), (2024, 2, 20));
    }

    #[test]
    fn test_sniff_first_token_wins() {
        let dt = sniff_date("Uploaded 2024-01-10 revised 2024-02-20").unwrap();
        assert_eq!(ymd(dt), (2024, 1, 10));
    }

    #[test]
    fn test_sniff_none() {
        assert!(sniff_date("Annual Report of the Committee").is_none());
        assert!(sniff_date("").is_none());
    }

    #[test]
    fn test_or_now() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(or_now(None, now), now.fixed_offset());

        let parsed = parse_date_token("2024-01-10").unwrap();
        assert_eq!(or_now(Some(parsed), now), parsed);
    }
}
