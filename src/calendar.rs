//! Jalali (Persian solar hijri) calendar conversion and Persian numerals.

use chrono::{DateTime, Datelike, TimeZone, Timelike};

const MONTHS_FA: [&str; 12] = [
    "فروردین",
    "اردیبهشت",
    "خرداد",
    "تیر",
    "مرداد",
    "شهریور",
    "مهر",
    "آبان",
    "آذر",
    "دی",
    "بهمن",
    "اسفند",
];

/// Cumulative day count at the start of each Gregorian month (non-leap).
const GREGORIAN_MONTH_OFFSETS: [i64; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JalaliDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl JalaliDate {
    /// Converts a proleptic Gregorian date using the 33-year arithmetic cycle.
    /// Exact for years 1178–1633 AP, which covers any timestamp we display.
    pub fn from_gregorian(year: i32, month: u32, day: u32) -> Self {
        let gy = year as i64;
        let gy2 = if month > 2 { gy + 1 } else { gy };
        let mut days = 355_666 + 365 * gy + (gy2 + 3) / 4 - (gy2 + 99) / 100 + (gy2 + 399) / 400
            + day as i64
            + GREGORIAN_MONTH_OFFSETS[(month as usize).clamp(1, 12) - 1];

        let mut jy = -1595 + 33 * (days / 12_053);
        days %= 12_053;
        jy += 4 * (days / 1461);
        days %= 1461;
        if days > 365 {
            jy += (days - 1) / 365;
            days = (days - 1) % 365;
        }

        let (jm, jd) = if days < 186 {
            (1 + days / 31, 1 + days % 31)
        } else {
            (7 + (days - 186) / 30, 1 + (days - 186) % 30)
        };

        Self {
            year: jy as i32,
            month: jm as u32,
            day: jd as u32,
        }
    }

    pub fn from_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        Self::from_gregorian(dt.year(), dt.month(), dt.day())
    }

    pub fn month_name(&self) -> &'static str {
        MONTHS_FA[(self.month as usize).clamp(1, 12) - 1]
    }

    /// `"۲۶ مهر ۱۴۰۳"`: zero-padded day, month name, year.
    pub fn to_persian_string(&self) -> String {
        format!(
            "{} {} {}",
            to_persian_digits(&format!("{:02}", self.day)),
            self.month_name(),
            to_persian_digits(&self.year.to_string())
        )
    }
}

/// `"HH:MM"` in Persian digits for the wall-clock time of `dt`.
pub fn persian_clock<Tz: TimeZone>(dt: &DateTime<Tz>) -> String {
    to_persian_digits(&format!("{:02}:{:02}", dt.hour(), dt.minute()))
}

/// Replaces ASCII digits with Extended Arabic-Indic (Persian) digits.
pub fn to_persian_digits(s: &str) -> String {
    s.chars()
        .map(|c| match c.to_digit(10) {
            Some(d) if c.is_ascii_digit() => char::from_u32(0x06F0 + d).unwrap_or(c),
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn nowruz_dates() {
        assert_eq!(
            JalaliDate::from_gregorian(2024, 3, 20),
            JalaliDate { year: 1403, month: 1, day: 1 }
        );
        assert_eq!(
            JalaliDate::from_gregorian(2025, 3, 21),
            JalaliDate { year: 1404, month: 1, day: 1 }
        );
        assert_eq!(
            JalaliDate::from_gregorian(2023, 3, 21),
            JalaliDate { year: 1402, month: 1, day: 1 }
        );
    }

    #[test]
    fn last_day_of_leap_year() {
        // 1403 is a leap year, so Esfand has 30 days
        assert_eq!(
            JalaliDate::from_gregorian(2025, 3, 20),
            JalaliDate { year: 1403, month: 12, day: 30 }
        );
    }

    #[test]
    fn second_half_of_year() {
        assert_eq!(
            JalaliDate::from_gregorian(2024, 10, 17),
            JalaliDate { year: 1403, month: 7, day: 26 }
        );
        assert_eq!(
            JalaliDate::from_gregorian(1970, 1, 1),
            JalaliDate { year: 1348, month: 10, day: 11 }
        );
    }

    #[test]
    fn persian_rendering() {
        let date = JalaliDate { year: 1403, month: 1, day: 5 };
        assert_eq!(date.to_persian_string(), "۰۵ فروردین ۱۴۰۳");
        assert_eq!(date.month_name(), "فروردین");

        let dt = Utc.with_ymd_and_hms(2024, 10, 17, 9, 5, 0).unwrap();
        assert_eq!(persian_clock(&dt), "۰۹:۰۵");
    }

    #[test]
    fn digit_mapping_leaves_other_chars() {
        assert_eq!(to_persian_digits("12,345 -7%"), "۱۲,۳۴۵ -۷%");
        assert_eq!(to_persian_digits("abc"), "abc");
    }
}
