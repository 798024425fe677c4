use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::SprawlError;

/// The calendar month a pipeline run reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunPeriod {
    year: i32,
    month: u32,
}

impl RunPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self, SprawlError> {
        if !(1..=12).contains(&month) {
            return Err(SprawlError::InvalidParameter {
                name: "month",
                value: month.to_string(),
                reason: "must be between 1 and 12".into(),
            });
        }
        Ok(Self { year, month })
    }

    #[inline] pub fn year(&self) -> i32 { self.year }

    #[inline] pub fn month(&self) -> u32 { self.month }

    /// The month before, wrapping January to December of the prior year.
    pub fn previous(&self) -> Self {
        match self.month {
            1 => Self { year: self.year - 1, month: 12 },
            m => Self { year: self.year, month: m - 1 },
        }
    }

    /// `YYYY_MM`, the run's directory name.
    pub fn label(&self) -> String { format!("{:04}_{:02}", self.year, self.month) }

    /// Last day of the month; imagery windows close on it.
    pub fn last_day(&self) -> u32 {
        match self.month {
            2 if is_leap(self.year) => 29,
            2 => 28,
            4 | 6 | 9 | 11 => 30,
            _ => 31,
        }
    }

    /// ISO date of the month's last day.
    pub fn window_end(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.last_day())
    }
}

#[inline]
fn is_leap(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

impl fmt::Display for RunPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for RunPeriod {
    type Err = SprawlError;

    /// Parses `YYYY_MM` or `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SprawlError::InvalidParameter {
            name: "period",
            value: s.to_string(),
            reason: "expected YYYY_MM".into(),
        };
        let (year, month) = s.split_once(['_', '-']).ok_or_else(invalid)?;
        RunPeriod::new(year.parse().map_err(|_| invalid())?, month.parse().map_err(|_| invalid())?)
    }
}
