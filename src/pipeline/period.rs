//! Period extraction: recognise the payroll cycle a page belongs to.
//!
//! Every payroll export carries a header phrase of the form
//! `"2024 Ocak Dönemi"` somewhere in its page text. The period is a calendar
//! month, normalised to its first day, and a whole document resolves to
//! exactly one period.

use chrono::{Datelike, Months, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_PERIOD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})\s+(\w+)\s+Dönemi").expect("period regex must compile"));

/// Scan page text for a `"<year> <month-name> Dönemi"` phrase.
///
/// Returns the period as a `NaiveDate` on the first day of the month, or
/// `None` when no phrase is present. The month name is matched
/// case-insensitively against the twelve Turkish month names; an
/// unrecognised name falls back to January rather than failing, matching
/// the tolerance of the rest of the extraction pipeline.
pub fn extract_period(page_text: &str) -> Option<NaiveDate> {
    let captures = RE_PERIOD.captures(page_text)?;
    let year: i32 = captures.get(1)?.as_str().parse().ok()?;
    let month = month_number(captures.get(2)?.as_str());
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Map a Turkish month name to its 1-based number.
///
/// Unrecognised names default to 1 (January).
fn month_number(name: &str) -> u32 {
    match name.to_lowercase().as_str() {
        "ocak" => 1,
        "şubat" => 2,
        "mart" => 3,
        "nisan" => 4,
        "mayıs" => 5,
        "haziran" => 6,
        "temmuz" => 7,
        "ağustos" => 8,
        "eylül" => 9,
        "ekim" => 10,
        "kasım" => 11,
        "aralık" => 12,
        _ => 1,
    }
}

/// The calendar month preceding `donem`, normalised to its first day.
///
/// Month arithmetic, not day arithmetic: subtracting 30 or 31 days from a
/// first-of-month date can skip a month or land mid-month depending on
/// month length.
pub fn previous_period(donem: NaiveDate) -> NaiveDate {
    let first = donem.with_day(1).unwrap_or(donem);
    first.checked_sub_months(Months::new(1)).unwrap_or(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn recognises_period_phrase() {
        assert_eq!(
            extract_period("ACME A.Ş.\n2024 Ocak Dönemi\nBordro İcmali"),
            Some(date(2024, 1, 1))
        );
        assert_eq!(
            extract_period("2023 Aralık Dönemi"),
            Some(date(2023, 12, 1))
        );
    }

    #[test]
    fn month_name_is_case_insensitive() {
        assert_eq!(extract_period("2024 OCAK Dönemi"), Some(date(2024, 1, 1)));
        assert_eq!(extract_period("2024 şubat Dönemi"), Some(date(2024, 2, 1)));
    }

    #[test]
    fn unrecognised_month_defaults_to_january() {
        assert_eq!(extract_period("2024 Foobar Dönemi"), Some(date(2024, 1, 1)));
    }

    #[test]
    fn absent_phrase_yields_none() {
        assert_eq!(extract_period(""), None);
        assert_eq!(extract_period("Bordro İcmali Ocak"), None);
        assert_eq!(extract_period("2024 Ocak"), None);
    }

    #[test]
    fn all_twelve_months_map() {
        let names = [
            "Ocak", "Şubat", "Mart", "Nisan", "Mayıs", "Haziran", "Temmuz", "Ağustos", "Eylül",
            "Ekim", "Kasım", "Aralık",
        ];
        for (index, name) in names.iter().enumerate() {
            let text = format!("2024 {} Dönemi", name);
            assert_eq!(
                extract_period(&text),
                Some(date(2024, index as u32 + 1, 1)),
                "month {name}"
            );
        }
    }

    #[test]
    fn previous_period_handles_year_boundary() {
        assert_eq!(previous_period(date(2024, 1, 1)), date(2023, 12, 1));
        assert_eq!(previous_period(date(2024, 3, 1)), date(2024, 2, 1));
    }

    #[test]
    fn previous_period_normalises_to_day_one() {
        assert_eq!(previous_period(date(2024, 3, 31)), date(2024, 2, 1));
    }
}
