//! The seven days shown in the grid.

use chrono::{Datelike, Duration, NaiveDate};

/// Weeks further than this from the reference are clamped.
const MAX_OFFSET_WEEKS: i64 = 10_000;

/// Monday..Sunday of one week, relative to a reference day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarWeek {
    offset: i64,
    days: [NaiveDate; 7],
}

impl CalendarWeek {
    /// The week containing `reference + offset` weeks.
    pub fn for_offset(reference: NaiveDate, offset: i64) -> Self {
        let offset = offset.clamp(-MAX_OFFSET_WEEKS, MAX_OFFSET_WEEKS);
        let shifted = reference
            .checked_add_signed(Duration::weeks(offset))
            .unwrap_or(reference);
        let monday = shifted - Duration::days(i64::from(shifted.weekday().num_days_from_monday()));

        let mut days = [monday; 7];
        for (i, day) in days.iter_mut().enumerate() {
            *day = monday + Duration::days(i as i64);
        }

        Self { offset, days }
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self::for_offset(date, 0)
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn days(&self) -> &[NaiveDate; 7] {
        &self.days
    }

    /// Day by column index, 0 = Monday.
    pub fn day(&self, index: usize) -> Option<NaiveDate> {
        self.days.get(index).copied()
    }

    pub fn monday(&self) -> NaiveDate {
        self.days[0]
    }

    pub fn sunday(&self) -> NaiveDate {
        self.days[6]
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.monday()..=self.sunday()).contains(&date)
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.days.iter().position(|d| *d == date)
    }

    /// Column headers, e.g. `Mon 3`.
    pub fn labels(&self) -> [String; 7] {
        self.days.map(|d| format!("{} {}", d.format("%a"), d.day()))
    }
}

impl std::fmt::Display for CalendarWeek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} .. {}",
            self.monday().format("%Y-%m-%d"),
            self.sunday().format("%Y-%m-%d")
        )
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_week_starts_monday() {
        // 2024-01-03 is a Wednesday
        let week = CalendarWeek::containing(date(2024, 1, 3));
        assert_eq!(week.monday(), date(2024, 1, 1));
        assert_eq!(week.sunday(), date(2024, 1, 7));
        assert_eq!(week.index_of(date(2024, 1, 3)), Some(2));
    }

    #[test]
    fn test_sunday_belongs_to_preceding_monday() {
        let week = CalendarWeek::containing(date(2024, 1, 7));
        assert_eq!(week.monday(), date(2024, 1, 1));
    }

    #[test]
    fn test_offsets_cross_year_boundary() {
        let week = CalendarWeek::for_offset(date(2024, 1, 3), -1);
        assert_eq!(week.monday(), date(2023, 12, 25));
        assert_eq!(week.offset(), -1);

        let week = CalendarWeek::for_offset(date(2024, 1, 3), 2);
        assert_eq!(week.monday(), date(2024, 1, 15));
        assert!(week.contains(date(2024, 1, 21)));
        assert!(!week.contains(date(2024, 1, 22)));
    }

    #[test]
    fn test_labels() {
        let week = CalendarWeek::containing(date(2024, 1, 3));
        let labels = week.labels();
        assert_eq!(labels[0], "Mon 1");
        assert_eq!(labels[6], "Sun 7");
        assert_eq!(week.day(7), None);
    }
}
