use chrono::FixedOffset;

use crate::prelude::*;

/// Campaign clock is Moscow time (UTC+3); the tap ceiling resets at
/// Moscow midnight, a hard date boundary.
const MOSCOW_OFFSET_SECS: i32 = 3 * 3600;

pub fn campaign_date() -> NaiveDate {
  campaign_date_at(Utc::now().naive_utc())
}

pub fn campaign_date_at(utc: DateTime) -> NaiveDate {
  let offset = FixedOffset::east_opt(MOSCOW_OFFSET_SECS).unwrap();
  (utc + TimeDelta::seconds(offset.local_minus_utc() as i64)).date()
}

pub fn format_date(date: DateTime) -> String {
  date.format("%d.%m.%Y %H:%M").to_string()
}

/// Strips formatting from a phone number; valid numbers carry exactly
/// 11 digits (the "+7 (XXX) XXX-XX-XX" mask).
pub fn normalize_phone(raw: &str) -> Option<String> {
  let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
  (digits.len() == 11).then_some(digits)
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDateTime;

  use super::*;

  #[test]
  fn moscow_date_crosses_midnight_before_utc() {
    let late_utc: NaiveDateTime =
      "2025-04-10T22:30:00".parse().expect("valid timestamp");
    assert_eq!(
      campaign_date_at(late_utc),
      "2025-04-11".parse::<NaiveDate>().unwrap()
    );

    let noon_utc: NaiveDateTime =
      "2025-04-10T12:00:00".parse().expect("valid timestamp");
    assert_eq!(
      campaign_date_at(noon_utc),
      "2025-04-10".parse::<NaiveDate>().unwrap()
    );
  }

  #[test]
  fn phone_normalization() {
    assert_eq!(
      normalize_phone("+7 (912) 345-67-89").as_deref(),
      Some("79123456789")
    );
    assert_eq!(normalize_phone("89123456789").as_deref(), Some("89123456789"));
    assert_eq!(normalize_phone("+7 (912) 345-67-8"), None);
    assert_eq!(normalize_phone("not a phone"), None);
  }
}
