//! Helpers for the manual-mode `week_set` day bitmask.
//!
//! The device stores the days a manual time slot is active on as a 7-bit
//! mask where bit 0 is Monday and bit 6 is Sunday.
//!
//! # Example
//!
//! ```
//! use venus_udp::utils::{days_in_week_set, format_week_set, week_set_from_days};
//! use venus_udp::Weekday;
//!
//! let mask = week_set_from_days(&[Weekday::Monday, Weekday::Friday]);
//! assert_eq!(mask, 0b001_0001);
//!
//! assert_eq!(days_in_week_set(mask), vec![Weekday::Monday, Weekday::Friday]);
//! assert_eq!(format_week_set(mask), "Mon,Fri");
//! ```

use crate::mode::Weekday;

/// Mask with every day of the week set.
pub const ALL_DAYS: u8 = 0b111_1111;

/// Mask with Monday to Friday set.
pub const WEEKDAYS: u8 = 0b001_1111;

/// Mask with Saturday and Sunday set.
pub const WEEKEND: u8 = 0b110_0000;

/// Returns whether a day is set in a mask.
///
/// # Example
///
/// ```
/// use venus_udp::utils::{day_enabled, WEEKEND};
/// use venus_udp::Weekday;
///
/// assert!(day_enabled(WEEKEND, Weekday::Sunday));
/// assert!(!day_enabled(WEEKEND, Weekday::Monday));
/// ```
#[inline]
pub fn day_enabled(week_set: u8, day: Weekday) -> bool {
    (week_set & (1 << day.index())) != 0
}

/// Sets or clears a day in a mask.
///
/// # Arguments
///
/// * `week_set` - The original mask
/// * `day` - Day to change
/// * `state` - Whether the day should be active
///
/// # Example
///
/// ```
/// use venus_udp::utils::set_day;
/// use venus_udp::Weekday;
///
/// let mask = set_day(0, Weekday::Wednesday, true);
/// assert_eq!(mask, 0b000_0100);
/// assert_eq!(set_day(mask, Weekday::Wednesday, false), 0);
/// ```
#[inline]
pub fn set_day(week_set: u8, day: Weekday, state: bool) -> u8 {
    if state {
        week_set | (1 << day.index())
    } else {
        week_set & !(1 << day.index())
    }
}

/// Builds a mask from a list of days. Duplicates are harmless.
pub fn week_set_from_days(days: &[Weekday]) -> u8 {
    days.iter().fold(0, |mask, &day| set_day(mask, day, true))
}

/// Lists the days set in a mask, Monday first. Bit 7 is ignored.
pub fn days_in_week_set(week_set: u8) -> Vec<Weekday> {
    Weekday::ALL
        .into_iter()
        .filter(|&day| day_enabled(week_set, day))
        .collect()
}

/// Formats a mask as comma-separated three-letter day names.
///
/// Returns `"-"` for an empty mask.
pub fn format_week_set(week_set: u8) -> String {
    let days = days_in_week_set(week_set);
    if days.is_empty() {
        return "-".to_string();
    }
    days.iter()
        .map(|day| day.to_string()[..3].to_string())
        .collect::<Vec<_>>()
        .join(",")
}
