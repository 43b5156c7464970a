//! Time-of-day intervals
//! Partitions pickup hours into AM Peak / Mid-day / PM Peak / Night and carries the
//! display colour and marker of each interval.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of four fixed time-of-day categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    Night,
    AmPeak,
    MidDay,
    PmPeak,
}

/// Marker shape used to draw an interval's points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Marker {
    Circle,
    Triangle,
    Square,
    Diamond,
}

impl Marker {
    /// Short code stored in the `markers` column.
    pub fn code(self) -> &'static str {
        match self {
            Marker::Circle => "o",
            Marker::Triangle => "^",
            Marker::Square => "s",
            Marker::Diamond => "D",
        }
    }
}

impl Interval {
    /// Display order; `Night` is also the regression reference level.
    pub const ALL: [Interval; 4] = [
        Interval::Night,
        Interval::AmPeak,
        Interval::MidDay,
        Interval::PmPeak,
    ];

    /// Categorize a pickup hour.
    ///
    /// Later ranges overwrite earlier ones; hours no range claims (4, 5, 6) stay AM Peak.
    pub fn from_hour(hour: i64) -> Self {
        let mut interval = Interval::AmPeak;
        if hour > 6 && hour < 13 {
            interval = Interval::MidDay;
        }
        if (13..=18).contains(&hour) {
            interval = Interval::PmPeak;
        }
        if hour > 18 || hour < 4 {
            interval = Interval::Night;
        }
        interval
    }

    pub fn label(self) -> &'static str {
        match self {
            Interval::Night => "Night",
            Interval::AmPeak => "AM Peak",
            Interval::MidDay => "Mid-day",
            Interval::PmPeak => "PM Peak",
        }
    }

    /// Colour name stored in the `colors` column.
    pub fn color(self) -> &'static str {
        match self {
            Interval::Night => "blue",
            Interval::AmPeak => "orange",
            Interval::MidDay => "green",
            Interval::PmPeak => "red",
        }
    }

    pub fn marker(self) -> Marker {
        match self {
            Interval::Night => Marker::Circle,
            Interval::AmPeak => Marker::Triangle,
            Interval::MidDay => Marker::Square,
            Interval::PmPeak => Marker::Diamond,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Hour annotation drawn next to weekday-chart points.
///
/// The source hours are three hours behind local time, so 0..=20 shift forward and
/// 21..=23 wrap to 0..=2.
pub fn display_hour(hour: i64) -> i64 {
    if hour <= 20 {
        hour + 3
    } else {
        hour - 21
    }
}
