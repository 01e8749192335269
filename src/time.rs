//! # Time windows and canonical map periods
//!
//! Every map covers a half-open interval `[start, end)` expressed in UTC
//! ([`TimeWindow`]). A request either lists its windows explicitly or declares a
//! recurring [`CanonicalMapPeriod`] which expands into contiguous windows.
//!
//! ## Canonical period arithmetic
//!
//! Boundaries are laid out with a **fixed 365.25-day year**:
//!
//! ```text
//! start_0 = Jan 1 (year) + (quarter - 1) / 4 * 365.25 d
//! end_i   = start_i + map_period / 12 * 365.25 d
//! start_i+1 = end_i
//! ```
//!
//! The resulting boundaries are not calendar-month aligned (e.g. a 3-month map of
//! Q1 2010 ends on 2010-04-02 07:30 UTC). Output filenames embed the first start
//! date, so this arithmetic must stay exactly as is.
use chrono::{Datelike, NaiveDateTime, Timelike};
use hifitime::{Duration, Epoch};
use serde::Deserialize;
use std::fmt;

use crate::{constants::AVERAGE_YEAR_SECONDS, mapper_errors::MapperError};

/// Half-open UTC interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start: Epoch,
    pub end: Epoch,
}

impl TimeWindow {
    /// Build a window, rejecting an end that precedes the start.
    pub fn new(start: Epoch, end: Epoch) -> Result<Self, MapperError> {
        if end < start {
            return Err(MapperError::configuration(
                "time_ranges",
                format!("{start} to {end}"),
            ));
        }
        Ok(TimeWindow { start, end })
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", iso_date(&self.start), iso_date(&self.end))
    }
}

/// Declarative recurring window generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CanonicalMapPeriod {
    pub year: i32,
    pub quarter: u8,
    /// Length of each map in months
    pub map_period: u32,
    pub number_of_maps: u32,
}

impl CanonicalMapPeriod {
    /// Expand the period into `number_of_maps` contiguous ascending windows.
    ///
    /// Return
    /// ----------
    /// * The windows, or a configuration error if the quarter is not in `1..=4` or
    ///   if the period or the number of maps is zero.
    pub fn calculate_date_ranges(&self) -> Result<Vec<TimeWindow>, MapperError> {
        if !(1..=4).contains(&self.quarter) {
            return Err(MapperError::configuration(
                "canonical_map_period.quarter",
                self.quarter.to_string(),
            ));
        }
        if self.map_period == 0 {
            return Err(MapperError::configuration(
                "canonical_map_period.map_period",
                "0",
            ));
        }
        if self.number_of_maps == 0 {
            return Err(MapperError::configuration(
                "canonical_map_period.number_of_maps",
                "0",
            ));
        }

        let quarter_offset = AVERAGE_YEAR_SECONDS * (self.quarter as i64 - 1) / 4;
        let map_length = AVERAGE_YEAR_SECONDS * self.map_period as i64 / 12;

        let jan_1 = Epoch::from_gregorian_utc_at_midnight(self.year, 1, 1);
        let mut start = jan_1 + Duration::from_seconds(quarter_offset as f64);

        let mut windows = Vec::with_capacity(self.number_of_maps as usize);
        for _ in 0..self.number_of_maps {
            let end = start + Duration::from_seconds(map_length as f64);
            windows.push(TimeWindow { start, end });
            start = end;
        }
        Ok(windows)
    }
}

/// Format an epoch as `YYYYMMDD` (UTC), the catalog and filename date format.
pub fn compact_date(epoch: &Epoch) -> String {
    let (y, m, d, _, _, _, _) = epoch.to_gregorian_utc();
    format!("{y:04}{m:02}{d:02}")
}

/// Format an epoch as `YYYY-MM-DD` (UTC), used in log messages.
pub fn iso_date(epoch: &Epoch) -> String {
    let (y, m, d, _, _, _, _) = epoch.to_gregorian_utc();
    format!("{y:04}-{m:02}-{d:02}")
}

/// Convert a naive UTC date-time into an [`Epoch`] (sub-second precision kept).
pub fn epoch_from_naive(datetime: &NaiveDateTime) -> Epoch {
    Epoch::from_gregorian_utc(
        datetime.year(),
        datetime.month() as u8,
        datetime.day() as u8,
        datetime.hour() as u8,
        datetime.minute() as u8,
        datetime.second() as u8,
        datetime.nanosecond().min(999_999_999),
    )
}

#[cfg(test)]
mod time_test {
    use super::*;

    fn utc(y: i32, mo: u8, d: u8, h: u8, mi: u8) -> Epoch {
        Epoch::from_gregorian_utc(y, mo, d, h, mi, 0, 0)
    }

    fn period(year: i32, quarter: u8, map_period: u32, number_of_maps: u32) -> CanonicalMapPeriod {
        CanonicalMapPeriod {
            year,
            quarter,
            map_period,
            number_of_maps,
        }
    }

    #[test]
    fn test_calculate_date_ranges_single_map() {
        let cases = [
            (period(2010, 1, 3, 1), utc(2010, 1, 1, 0, 0), utc(2010, 4, 2, 7, 30)),
            (period(2013, 3, 3, 1), utc(2013, 7, 2, 15, 0), utc(2013, 10, 1, 22, 30)),
            (period(2017, 4, 3, 1), utc(2017, 10, 1, 22, 30), utc(2018, 1, 1, 6, 0)),
            (period(2010, 1, 6, 1), utc(2010, 1, 1, 0, 0), utc(2010, 7, 2, 15, 0)),
            (period(2013, 3, 6, 1), utc(2013, 7, 2, 15, 0), utc(2014, 1, 1, 6, 0)),
            (period(2017, 4, 6, 1), utc(2017, 10, 1, 22, 30), utc(2018, 4, 2, 13, 30)),
            (period(2010, 1, 12, 1), utc(2010, 1, 1, 0, 0), utc(2011, 1, 1, 6, 0)),
            (period(2013, 3, 12, 1), utc(2013, 7, 2, 15, 0), utc(2014, 7, 2, 21, 0)),
        ];

        for (canonical, start, end) in cases {
            let windows = canonical.calculate_date_ranges().unwrap();
            assert_eq!(windows, vec![TimeWindow { start, end }], "{canonical:?}");
        }
    }

    #[test]
    fn test_calculate_date_ranges_contiguous_windows() {
        let windows = period(2010, 1, 3, 2).calculate_date_ranges().unwrap();
        assert_eq!(
            windows,
            vec![
                TimeWindow {
                    start: utc(2010, 1, 1, 0, 0),
                    end: utc(2010, 4, 2, 7, 30)
                },
                TimeWindow {
                    start: utc(2010, 4, 2, 7, 30),
                    end: utc(2010, 7, 2, 15, 0)
                },
            ]
        );

        let windows = period(2013, 2, 6, 3).calculate_date_ranges().unwrap();
        assert_eq!(windows.len(), 3);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
            assert!(pair[0].start < pair[1].start);
        }
    }

    #[test]
    fn test_calculate_date_ranges_rejects_bad_quarter() {
        let err = period(2025, 5, 6, 1).calculate_date_ranges().unwrap_err();
        assert_eq!(
            err,
            MapperError::configuration("canonical_map_period.quarter", "5")
        );
    }

    #[test]
    fn test_date_formats() {
        let epoch = utc(2025, 1, 9, 13, 45);
        assert_eq!(compact_date(&epoch), "20250109");
        assert_eq!(iso_date(&epoch), "2025-01-09");

        let window = TimeWindow::new(utc(2025, 1, 1, 0, 0), utc(2025, 7, 2, 15, 0)).unwrap();
        assert_eq!(window.to_string(), "2025-01-01 to 2025-07-02");
    }

    #[test]
    fn test_epoch_from_naive() {
        let naive =
            NaiveDateTime::parse_from_str("2025-04-15, 12:30:05", "%Y-%m-%d, %H:%M:%S").unwrap();
        assert_eq!(
            epoch_from_naive(&naive),
            Epoch::from_gregorian_utc(2025, 4, 15, 12, 30, 5, 0)
        );
    }

    #[test]
    fn test_time_window_rejects_reversed_bounds() {
        assert!(TimeWindow::new(utc(2025, 2, 1, 0, 0), utc(2025, 1, 1, 0, 0)).is_err());
        assert!(TimeWindow::new(utc(2025, 1, 1, 0, 0), utc(2025, 1, 1, 0, 0)).is_ok());
    }
}
