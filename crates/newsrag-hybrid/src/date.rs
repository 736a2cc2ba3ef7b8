//! Free-form date parsing for filters and metadata.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

use newsrag_core::traits::DateParser;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S%.f"];
// Slash dates are read month first.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d %b %Y", "%Y%m%d"];

/// Absolute dates in RFC 3339, RFC 2822 and common calendar layouts (read
/// as UTC), plus relative forms: `now`, `today`, `yesterday`,
/// `N days|weeks|months|years ago`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChronoDateParser;

impl ChronoDateParser {
    pub fn parse_relative_to(&self, text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
            return Some(dt.with_timezone(&Utc));
        }
        for fmt in DATETIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
                return Some(Utc.from_utc_datetime(&naive));
            }
        }
        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
                return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
            }
        }
        relative(&text.to_lowercase(), now)
    }
}

fn relative(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match text {
        "now" | "today" => return Some(now),
        "yesterday" => return Some(now - Duration::days(1)),
        _ => {}
    }
    let parts: Vec<&str> = text.split_whitespace().collect();
    let [amount, unit, "ago"] = parts.as_slice() else { return None };
    let amount: i64 = match *amount {
        "a" | "an" | "one" => 1,
        n => n.parse().ok()?,
    };
    let days_per_unit = match unit.trim_end_matches('s') {
        "day" => 1,
        "week" => 7,
        "month" => 30,
        "year" => 365,
        _ => return None,
    };
    now.checked_sub_signed(Duration::try_days(amount.checked_mul(days_per_unit)?)?)
}

impl DateParser for ChronoDateParser {
    fn parse(&self, text: &str) -> Option<DateTime<Utc>> {
        self.parse_relative_to(text, Utc::now())
    }
}
