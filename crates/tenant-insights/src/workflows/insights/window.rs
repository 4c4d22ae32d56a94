use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

const EARLIEST_YEAR: i32 = 1970;
const LATEST_YEAR: i32 = 9999;

/// Inclusive calendar date range used to scope activity queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        if from <= to {
            Self { from, to }
        } else {
            Self { from: to, to: from }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    pub fn contains_instant(&self, at: DateTime<Utc>) -> bool {
        self.contains(at.date_naive())
    }
}

/// Monday-aligned seven day window a weekly report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WeekWindow {
    start: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("week start {0} is not a Monday")]
    NotMonday(NaiveDate),
    #[error("week start {0} is outside the supported calendar range")]
    OutOfRange(NaiveDate),
}

impl WeekWindow {
    /// Window starting on `start`, which must be a Monday.
    pub fn starting(start: NaiveDate) -> Result<Self, WindowError> {
        if !(EARLIEST_YEAR..=LATEST_YEAR).contains(&start.year()) {
            return Err(WindowError::OutOfRange(start));
        }
        if start.weekday() != Weekday::Mon {
            return Err(WindowError::NotMonday(start));
        }
        Ok(Self { start })
    }

    /// Window for the week `date` falls in.
    pub fn containing(date: NaiveDate) -> Self {
        let offset = u64::from(date.weekday().num_days_from_monday());
        let start = date.checked_sub_days(Days::new(offset)).unwrap_or(date);
        Self { start }
    }

    /// Most recent fully elapsed week relative to `today`.
    pub fn last_completed(today: NaiveDate) -> Self {
        Self::containing(today).previous()
    }

    pub fn start(self) -> NaiveDate {
        self.start
    }

    pub fn end(self) -> NaiveDate {
        self.start.checked_add_days(Days::new(6)).unwrap_or(self.start)
    }

    pub fn previous(self) -> Self {
        let start = self.start.checked_sub_days(Days::new(7)).unwrap_or(self.start);
        Self { start }
    }

    pub fn next(self) -> Self {
        let start = self.start.checked_add_days(Days::new(7)).unwrap_or(self.start);
        Self { start }
    }

    pub fn range(self) -> DateRange {
        DateRange {
            from: self.start,
            to: self.end(),
        }
    }

    /// The previous week and this one, as a single query range.
    pub fn with_previous(self) -> DateRange {
        DateRange {
            from: self.previous().start,
            to: self.end(),
        }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        self.range().contains(date)
    }

    pub fn contains_instant(self, at: DateTime<Utc>) -> bool {
        self.contains(at.date_naive())
    }
}

impl fmt::Display for WeekWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end())
    }
}
