//! Week window utilities.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};

use crate::types::WeekWindow;

/// Sunday-aligned window containing `at` (UTC calendar).
pub fn week_window(at: DateTime<Utc>) -> WeekWindow {
  window_for_date(at.date_naive())
}

pub fn window_for_date(date: NaiveDate) -> WeekWindow {
  let back = u64::from(date.weekday().num_days_from_sunday());
  let start = date - Days::new(back);
  WeekWindow {
    start,
    end: start + Days::new(6),
  }
}
