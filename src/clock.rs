use std::cell::Cell;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};

/// Source of local wall time.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Cell<NaiveDateTime>,
}

impl FixedClock {
    /// Midnight of `day`.
    pub fn new(day: NaiveDate) -> Self {
        Self::at(day.and_time(NaiveTime::default()))
    }

    pub fn at(now: NaiveDateTime) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    /// Moves to another day, keeping the time of day.
    pub fn set(&self, day: NaiveDate) {
        self.now.set(day.and_time(self.now.get().time()));
    }

    pub fn set_now(&self, now: NaiveDateTime) {
        self.now.set(now);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.now.get()
    }
}
