use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Asia::Tehran;

use crate::calendar::{persian_clock, to_persian_digits, JalaliDate};

pub const UP: &str = "\u{1f4c8}"; // 📈
pub const DOWN: &str = "\u{1f4c9}"; // 📉

/// Price in rial → toman with thousands separators: `5000000` → `"500,000"`.
pub fn format_price(rial: i64) -> String {
    group_thousands(rial / 10)
}

pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn change_symbol(change_amount: i64) -> &'static str {
    if change_amount < 0 {
        DOWN
    } else {
        UP
    }
}

pub fn percentage_symbol(change: f64) -> &'static str {
    if change < 0.0 {
        DOWN
    } else {
        UP
    }
}

/// Parses display percentages such as `"-2.35%"`, `"+0.4 %"` or `"1,250.5"`.
pub fn parse_percentage(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '%' | '+' | ',') && !c.is_whitespace())
        .collect();
    cleaned.parse().ok()
}

/// Parses an ISO-8601 timestamp. Values without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Tehran-local Jalali `(date, time)` strings in Persian digits.
pub fn persian_date_time(dt: &DateTime<Utc>) -> (String, String) {
    let local = dt.with_timezone(&Tehran);
    (
        JalaliDate::from_datetime(&local).to_persian_string(),
        persian_clock(&local),
    )
}

/// Time left until the next midnight in Tehran, e.g. `"۵ ساعت و ۱۲ دقیقه"`.
pub fn time_until_midnight_tehran(now: DateTime<Utc>) -> String {
    let local = now.with_timezone(&Tehran);
    let tomorrow = local.date_naive() + Duration::days(1);
    let midnight = tomorrow
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| Tehran.from_local_datetime(&naive).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now);

    let remaining = (midnight - now).num_minutes().max(0);
    to_persian_digits(&format!(
        "{} ساعت و {} دقیقه",
        remaining / 60,
        remaining % 60
    ))
}

pub struct UsageLevel {
    pub percent: i64,
    pub emoji: &'static str,
    pub warning: &'static str,
}

/// Buckets daily quota consumption. A zero quota counts as exhausted.
pub fn usage_level(request_count: i64, max_request_count: i64) -> UsageLevel {
    let percent = if max_request_count <= 0 {
        100
    } else {
        request_count.max(0).saturating_mul(100) / max_request_count
    };

    let emoji = match percent {
        p if p < 40 => "\u{1f7e2}",
        p if p < 70 => "\u{1f7e1}",
        p if p < 90 => "\u{1f7e0}",
        _ => "\u{1f534}",
    };
    let warning = match percent {
        p if p >= 100 => "\u{26d4} <b>شما به سقف مجاز امروز رسیدید !</b>",
        p if p >= 90 => "\u{1f6a8} <b>شما به سقف مجاز امروز نزدیک شده‌اید!</b>",
        p if p >= 70 => "\u{26a0}\u{fe0f} <b>در حال نزدیک شدن به سقف مجاز هستید.</b>",
        _ => "",
    };

    UsageLevel { percent, emoji, warning }
}
