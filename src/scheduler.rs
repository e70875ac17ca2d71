//! Tick-driven detection of calendar rollovers and periodic work
//!
//! Nothing here owns a timer. The processor polls [`Scheduler::poll`] with
//! the current instant between observations and acts on the returned
//! [`Due`] flags.

use crate::config::ProcessingConfig;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{debug, info};

/// Calendar boundaries crossed since the previous poll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rollover {
    pub daily: bool,
    pub weekly: bool,
    pub monthly: bool,
    pub yearly: bool,
}

impl Rollover {
    /// Every larger boundary implies a day change
    #[must_use]
    pub fn any(&self) -> bool {
        self.daily
    }

    fn between(previous: NaiveDate, current: NaiveDate) -> Self {
        if current <= previous {
            return Self::default();
        }
        Self {
            daily: true,
            weekly: previous.iso_week() != current.iso_week(),
            monthly: (previous.year(), previous.month()) != (current.year(), current.month()),
            yearly: previous.year() != current.year(),
        }
    }
}

/// Work the processor should do on this tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Due {
    pub rollover: Rollover,
    pub high_low: bool,
    pub housekeeping: bool,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    tz: Tz,
    current_date: NaiveDate,
    high_low_interval: Duration,
    housekeeping_interval: Duration,
    last_high_low: Option<DateTime<Utc>>,
    last_housekeeping: DateTime<Utc>,
}

impl Scheduler {
    #[must_use]
    pub fn new(tz: Tz, processing: &ProcessingConfig, now: DateTime<Utc>) -> Self {
        Self {
            tz,
            current_date: now.with_timezone(&tz).date_naive(),
            high_low_interval: Duration::seconds(saturating_secs(processing.high_low_interval_secs)),
            housekeeping_interval: Duration::seconds(saturating_secs(
                processing.housekeeping_interval_secs,
            )),
            last_high_low: None,
            last_housekeeping: now,
        }
    }

    /// Resume from the date a previous run last rolled over to.
    ///
    /// A date before today is rolled over on the next poll, so a process
    /// that was down across midnight still closes out the missed day.
    #[must_use]
    pub fn resume_from(mut self, date: NaiveDate) -> Self {
        self.current_date = date;
        self
    }

    /// Local calendar date at `at`
    #[must_use]
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.tz).date_naive()
    }

    /// Date the scheduler currently considers "today"
    #[must_use]
    pub fn current_date(&self) -> NaiveDate {
        self.current_date
    }

    /// Start of the current local day as a UTC instant.
    ///
    /// Where midnight does not exist locally (DST gap) the first valid
    /// instant of the day is used.
    #[must_use]
    pub fn last_midnight(&self) -> DateTime<Utc> {
        let midnight = self.current_date.and_time(chrono::NaiveTime::MIN);
        self.tz
            .from_local_datetime(&midnight)
            .earliest()
            .or_else(|| {
                self.tz
                    .from_local_datetime(&(midnight + Duration::hours(1)))
                    .earliest()
            })
            .map_or_else(
                || Utc.from_utc_datetime(&midnight),
                |local| local.with_timezone(&Utc),
            )
    }

    /// Advance to `now` and report what has become due.
    ///
    /// A clock that moves backwards across midnight does not roll anything.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Due {
        let today = self.local_date(now);
        let rollover = Rollover::between(self.current_date, today);
        if rollover.any() {
            info!(
                from = %self.current_date,
                to = %today,
                weekly = rollover.weekly,
                monthly = rollover.monthly,
                yearly = rollover.yearly,
                "Local day changed"
            );
            self.current_date = today;
        } else if today < self.current_date {
            debug!(current = %self.current_date, seen = %today, "Clock moved back, keeping date");
        }

        let high_low = self
            .last_high_low
            .is_none_or(|last| now - last >= self.high_low_interval);
        if high_low {
            self.last_high_low = Some(now);
        }

        let housekeeping =
            rollover.daily || now - self.last_housekeeping >= self.housekeeping_interval;
        if housekeeping {
            self.last_housekeeping = now;
        }

        Due {
            rollover,
            high_low,
            housekeeping,
        }
    }
}

fn saturating_secs(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1_000)
}
