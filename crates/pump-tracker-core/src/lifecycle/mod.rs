//! Lifecycle primitives shared by every other module.
//!
//! - [`normalizer`]: canonical join keys for serials, branches and hospitals
//! - [`dates`]: the single point of date ingestion
//! - [`status`]: loan status derivation from departure date + loan period

mod dates;
mod normalizer;
mod status;

pub use dates::*;
pub use normalizer::*;
pub use status::*;

use chrono::{DateTime, Local, NaiveDate, Utc};

/// Source of "today" for date arithmetic.
///
/// Status derivation and availability checks are pure given a clock, so
/// tests inject a [`FixedClock`].
pub trait Clock {
    /// Current calendar date.
    fn today(&self) -> NaiveDate;

    /// Current instant, used for event timestamps.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock. Calendar dates are taken in the host's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a fixed date (midday UTC).
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    today: NaiveDate,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.today
    }

    fn now(&self) -> DateTime<Utc> {
        self.today
            .and_hms_opt(12, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now)
    }
}
