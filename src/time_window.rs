//! Time window selection and timestamp parsing
//!
//! A window is half-open, `[start, end)`, and is sampled at a fixed step
//! (six-hourly by default, the analysis cadence of the ensemble).

use crate::errors::{Result, RuEnsError};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::fmt;

/// Default sampling step between analysis times
pub const DEFAULT_STEP_HOURS: i64 = 6;

/// Display format for window bounds and commit messages
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ACCEPTED_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A `[start, end)` range of analysis times
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeWindow {
    /// Create a window, rejecting empty or inverted ranges
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if end <= start {
            return Err(RuEnsError::InvalidWindow {
                message: format!(
                    "end {} must be after start {}",
                    end.format(DISPLAY_FORMAT),
                    start.format(DISPLAY_FORMAT)
                ),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// Whether `t` falls inside the window
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        t >= self.start && t < self.end
    }

    /// All sample times in the window, `start` first
    ///
    /// # Errors
    ///
    /// Returns an error if `step` is not positive.
    pub fn timestamps(&self, step: Duration) -> Result<Vec<NaiveDateTime>> {
        if step <= Duration::zero() {
            return Err(RuEnsError::InvalidWindow {
                message: format!("step must be positive, got {step}"),
            });
        }

        let mut times = Vec::new();
        let mut t = self.start;
        while t < self.end {
            times.push(t);
            match t.checked_add_signed(step) {
                Some(next) => t = next,
                None => break,
            }
        }
        Ok(times)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format(DISPLAY_FORMAT),
            self.end.format(DISPLAY_FORMAT)
        )
    }
}

/// Parse a timestamp given on the command line
///
/// Accepts `YYYY-MM-DDTHH`, `YYYY-MM-DDTHH:MM[:SS]` (a space works in place of
/// `T`) and a bare `YYYY-MM-DD`, which means midnight.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();

    for format in ACCEPTED_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(t);
        }
    }

    // Hour-only forms carry no minutes, which chrono refuses to parse directly
    if let Some((date, hour)) = s.split_once(['T', ' ']) {
        if let (Ok(date), Ok(hour)) = (
            NaiveDate::parse_from_str(date, "%Y-%m-%d"),
            hour.parse::<u32>(),
        ) {
            if let Some(t) = date.and_hms_opt(hour, 0, 0) {
                return Ok(t);
            }
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(t) = date.and_hms_opt(0, 0, 0) {
            return Ok(t);
        }
    }

    Err(RuEnsError::InvalidWindow {
        message: format!("cannot parse timestamp '{s}'"),
    })
}
