//! Dump file name templates.
//!
//! File name formats use the Go reference-time layout
//! (`Mon Jan 2 15:04:05 MST 2006`), so existing configuration files keep
//! producing the same names. After the timestamp is rendered, `%s` is
//! replaced by the database name.

use chrono::{DateTime, Datelike, FixedOffset, Timelike};

const LONG_MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const LONG_WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    LongMonth,
    Month,
    NumMonth,
    ZeroMonth,
    LongWeekDay,
    WeekDay,
    Day,
    UnderDay,
    ZeroDay,
    UnderYearDay,
    ZeroYearDay,
    Hour,
    Hour12,
    ZeroHour12,
    Minute,
    ZeroMinute,
    Second,
    ZeroSecond,
    LongYear,
    Year,
    UpperPm,
    LowerPm,
    ZoneName,
    IsoTz,
    IsoColonTz,
    IsoShortTz,
    NumTz,
    NumColonTz,
    NumShortTz,
    Fraction { sep: char, digits: usize, trim: bool },
}

/// Find the layout element at the start of `s`, with its byte length
fn next_token(s: &str) -> Option<(Token, usize)> {
    let b = s.as_bytes();
    let first = *b.first()?;
    let second = b.get(1).copied();

    match first {
        b'J' if s.starts_with("January") => Some((Token::LongMonth, 7)),
        b'J' if s.starts_with("Jan") => Some((Token::Month, 3)),
        b'M' if s.starts_with("Monday") => Some((Token::LongWeekDay, 6)),
        b'M' if s.starts_with("Mon") => Some((Token::WeekDay, 3)),
        b'M' if s.starts_with("MST") => Some((Token::ZoneName, 3)),
        b'0' => match second {
            Some(b'1') => Some((Token::ZeroMonth, 2)),
            Some(b'2') => Some((Token::ZeroDay, 2)),
            Some(b'3') => Some((Token::ZeroHour12, 2)),
            Some(b'4') => Some((Token::ZeroMinute, 2)),
            Some(b'5') => Some((Token::ZeroSecond, 2)),
            Some(b'6') => Some((Token::Year, 2)),
            Some(b'0') if b.get(2) == Some(&b'2') => Some((Token::ZeroYearDay, 3)),
            _ => None,
        },
        b'1' if second == Some(b'5') => Some((Token::Hour, 2)),
        b'1' => Some((Token::NumMonth, 1)),
        b'2' if s.starts_with("2006") => Some((Token::LongYear, 4)),
        b'2' => Some((Token::Day, 1)),
        // "_2006" is a literal underscore followed by the year
        b'_' if s.starts_with("_2") && !s.starts_with("_2006") => Some((Token::UnderDay, 2)),
        b'_' if s.starts_with("__2") => Some((Token::UnderYearDay, 3)),
        b'3' => Some((Token::Hour12, 1)),
        b'4' => Some((Token::Minute, 1)),
        b'5' => Some((Token::Second, 1)),
        b'P' if second == Some(b'M') => Some((Token::UpperPm, 2)),
        b'p' if second == Some(b'm') => Some((Token::LowerPm, 2)),
        b'-' if s.starts_with("-07:00") => Some((Token::NumColonTz, 6)),
        b'-' if s.starts_with("-0700") => Some((Token::NumTz, 5)),
        b'-' if s.starts_with("-07") => Some((Token::NumShortTz, 3)),
        b'Z' if s.starts_with("Z07:00") => Some((Token::IsoColonTz, 6)),
        b'Z' if s.starts_with("Z0700") => Some((Token::IsoTz, 5)),
        b'Z' if s.starts_with("Z07") => Some((Token::IsoShortTz, 3)),
        b'.' | b',' if matches!(second, Some(b'0') | Some(b'9')) => {
            let digit = second?;
            let run = b[1..].iter().take_while(|&&c| c == digit).count();
            if b.get(1 + run).is_some_and(u8::is_ascii_digit) {
                return None;
            }
            Some((
                Token::Fraction {
                    sep: first as char,
                    digits: run.min(9),
                    trim: digit == b'9',
                },
                1 + run,
            ))
        }
        _ => None,
    }
}

fn push_offset(out: &mut String, offset_secs: i32, colon: bool, short: bool) {
    let sign = if offset_secs < 0 { '-' } else { '+' };
    let abs = offset_secs.unsigned_abs();
    let hours = abs / 3600;
    let minutes = (abs % 3600) / 60;
    out.push(sign);
    out.push_str(&format!("{:02}", hours));
    if !short {
        if colon {
            out.push(':');
        }
        out.push_str(&format!("{:02}", minutes));
    }
}

fn render(token: Token, t: &DateTime<FixedOffset>, out: &mut String) {
    let month0 = t.month0() as usize;
    let hour12 = match t.hour() % 12 {
        0 => 12,
        h => h,
    };
    let offset = t.offset().local_minus_utc();

    match token {
        Token::LongMonth => out.push_str(LONG_MONTHS[month0]),
        Token::Month => out.push_str(&LONG_MONTHS[month0][..3]),
        Token::NumMonth => out.push_str(&t.month().to_string()),
        Token::ZeroMonth => out.push_str(&format!("{:02}", t.month())),
        Token::LongWeekDay => {
            out.push_str(LONG_WEEKDAYS[t.weekday().num_days_from_monday() as usize])
        }
        Token::WeekDay => {
            out.push_str(&LONG_WEEKDAYS[t.weekday().num_days_from_monday() as usize][..3])
        }
        Token::Day => out.push_str(&t.day().to_string()),
        Token::UnderDay => out.push_str(&format!("{:>2}", t.day())),
        Token::ZeroDay => out.push_str(&format!("{:02}", t.day())),
        Token::UnderYearDay => out.push_str(&format!("{:>3}", t.ordinal())),
        Token::ZeroYearDay => out.push_str(&format!("{:03}", t.ordinal())),
        Token::Hour => out.push_str(&format!("{:02}", t.hour())),
        Token::Hour12 => out.push_str(&hour12.to_string()),
        Token::ZeroHour12 => out.push_str(&format!("{:02}", hour12)),
        Token::Minute => out.push_str(&t.minute().to_string()),
        Token::ZeroMinute => out.push_str(&format!("{:02}", t.minute())),
        Token::Second => out.push_str(&t.second().to_string()),
        Token::ZeroSecond => out.push_str(&format!("{:02}", t.second())),
        Token::LongYear => out.push_str(&format!("{:04}", t.year())),
        Token::Year => out.push_str(&format!("{:02}", t.year().rem_euclid(100))),
        Token::UpperPm => out.push_str(if t.hour() >= 12 { "PM" } else { "AM" }),
        Token::LowerPm => out.push_str(if t.hour() >= 12 { "pm" } else { "am" }),
        Token::ZoneName if offset == 0 => out.push_str("UTC"),
        Token::ZoneName => push_offset(out, offset, false, false),
        Token::IsoTz | Token::IsoColonTz | Token::IsoShortTz if offset == 0 => out.push('Z'),
        Token::IsoTz | Token::NumTz => push_offset(out, offset, false, false),
        Token::IsoColonTz | Token::NumColonTz => push_offset(out, offset, true, false),
        Token::IsoShortTz | Token::NumShortTz => push_offset(out, offset, false, true),
        Token::Fraction { sep, digits, trim } => {
            let nanos = format!("{:09}", t.nanosecond() % 1_000_000_000);
            let mut fraction = &nanos[..digits];
            if trim {
                fraction = fraction.trim_end_matches('0');
            }
            if !fraction.is_empty() {
                out.push(sep);
                out.push_str(fraction);
            }
        }
    }
}

/// Render `layout` (Go reference-time syntax) at time `t`
pub fn format_go_layout(layout: &str, t: &DateTime<FixedOffset>) -> String {
    let mut out = String::with_capacity(layout.len() + 8);
    let mut rest = layout;

    while let Some(c) = rest.chars().next() {
        match next_token(rest) {
            Some((token, len)) => {
                render(token, t, &mut out);
                rest = &rest[len..];
            }
            None => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }

    out
}

/// Substitute `%s` with the database name; `%%` becomes a literal `%`
pub fn format_with_database(format: &str, database_name: &str) -> String {
    let mut out = String::with_capacity(format.len() + database_name.len());
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('s') => {
                chars.next();
                out.push_str(database_name);
            }
            Some('%') => {
                chars.next();
                out.push('%');
            }
            _ => out.push('%'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn fixed_time() -> DateTime<FixedOffset> {
        Utc.with_ymd_and_hms(2022, 6, 1, 1, 2, 3).unwrap().fixed_offset()
    }

    #[test]
    fn test_reference_layout() {
        let t = fixed_time();
        assert_eq!(
            format_go_layout("%s-2006-01-02T150405", &t),
            "%s-2022-06-01T010203"
        );
    }

    #[test]
    fn test_names_and_twelve_hour_clock() {
        let t = FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2022, 6, 1, 15, 4, 5)
            .unwrap();
        assert_eq!(
            format_go_layout("Mon Jan _2 3:04PM -07:00", &t),
            "Wed Jun  1 3:04PM +02:00"
        );
        assert_eq!(format_go_layout("Monday, January 02", &t), "Wednesday, June 01");
    }

    #[test]
    fn test_iso_zone_is_z_for_utc() {
        let t = fixed_time();
        assert_eq!(format_go_layout("15:04Z07:00", &t), "01:02Z");
        assert_eq!(format_go_layout("MST", &t), "UTC");
    }

    #[test]
    fn test_fraction_and_year_day() {
        let t = Utc
            .with_ymd_and_hms(2022, 2, 3, 4, 5, 6)
            .unwrap()
            .with_nanosecond(120_000_000)
            .unwrap()
            .fixed_offset();
        assert_eq!(format_go_layout("05.000", &t), "06.120");
        assert_eq!(format_go_layout("05.999", &t), "06.12");
        assert_eq!(format_go_layout("002", &t), "034");
        assert_eq!(format_go_layout("06", &t), "22");
    }

    #[test]
    fn test_literal_text_passes_through() {
        let t = fixed_time();
        assert_eq!(format_go_layout("backup_", &t), "backup_");
        assert_eq!(format_go_layout("_2006", &t), "_2022");
    }

    #[test]
    fn test_database_substitution() {
        assert_eq!(format_with_database("%s-dump", "shop"), "shop-dump");
        assert_eq!(format_with_database("100%%-%s", "shop"), "100%-shop");
        assert_eq!(format_with_database("no-name", "shop"), "no-name");
        assert_eq!(format_with_database("trailing%", "shop"), "trailing%");
    }
}
