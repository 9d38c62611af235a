//! Per-task timer transitions.
//!
//! A timer is either stopped or running; `running` on the record is the only
//! state. Every transition is idempotent: a redundant start or pause leaves
//! the record untouched and reports `false`. Enforcing a single running task
//! across the list is the store's job, not this module's.

use chrono::{Datelike, NaiveDateTime, Weekday};

use crate::domain::TaskRecord;

/// What a single tick did to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickOutcome {
    pub accumulated: bool,
    /// Set only on the tick where `curr_time` first reaches `planned`.
    pub planned_reached: bool,
    pub overtime: bool,
}

impl TaskRecord {
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        true
    }

    /// Adds one second. A tick that arrives after the timer stopped is stale
    /// and does nothing.
    pub fn tick(&mut self, weekday: Weekday) -> TickOutcome {
        if !self.running {
            return TickOutcome::default();
        }

        self.curr_time = self.curr_time.saturating_add(1);
        self.sync_ledger(weekday);

        TickOutcome {
            accumulated: true,
            planned_reached: self.curr_time == self.planned,
            overtime: self.is_overtime(),
        }
    }

    /// Credits the wall time since the last stamp to a timer that stayed
    /// running while nothing ticked it. Stamps from an earlier day count for
    /// nothing.
    pub fn catch_up(&mut self, now: NaiveDateTime) -> TickOutcome {
        let Some(stamp) = self.date_time.filter(|stamp| stamp.date() == now.date()) else {
            return TickOutcome::default();
        };
        if !self.running {
            return TickOutcome::default();
        }
        let elapsed = match u64::try_from((now - stamp).num_seconds()) {
            Ok(elapsed) if elapsed > 0 => elapsed,
            _ => return TickOutcome::default(),
        };

        let before = self.curr_time;
        self.curr_time = self.curr_time.saturating_add(elapsed);
        self.date_time = Some(now);
        self.sync_ledger(now.weekday());

        TickOutcome {
            accumulated: true,
            planned_reached: before < self.planned && self.curr_time >= self.planned,
            overtime: self.is_overtime(),
        }
    }

    pub fn pause(&mut self, weekday: Weekday) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        self.last_stop = self.curr_time;
        self.sync_ledger(weekday);
        true
    }

    /// Like [`pause`](Self::pause), but first rounds `curr_time` up to the
    /// next multiple of the task's round-up step.
    pub fn stop_with_round_up(&mut self, weekday: Weekday) -> bool {
        if !self.running {
            return false;
        }
        self.curr_time = round_up(self.curr_time, self.round_up_minutes);
        self.pause(weekday)
    }

    /// Zeroes today's time. A running timer keeps running from zero.
    pub fn restart(&mut self, weekday: Weekday) {
        let was_running = self.running;
        self.running = false;
        self.curr_time = 0;
        self.last_stop = 0;
        self.sync_ledger(weekday);
        if was_running {
            self.start();
        }
    }

    pub(crate) fn sync_ledger(&mut self, weekday: Weekday) {
        self.weekdays
            .update_day(weekday, self.curr_time, self.planned, self.last_stop);
    }
}

/// Smallest multiple of `minutes * 60` that is not below `seconds`.
pub fn round_up(seconds: u64, minutes: u32) -> u64 {
    if minutes == 0 {
        return seconds;
    }
    let step = u64::from(minutes) * 60;
    seconds.div_ceil(step) * step
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime, Weekday};

    use super::round_up;
    use crate::domain::TaskRecord;

    fn at(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").expect("valid stamp")
    }

    fn task(planned: u64) -> TaskRecord {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
        TaskRecord::new(1, "Focus".to_string(), planned, "#123456".to_string(), today)
    }

    #[test]
    fn ticks_accumulate_without_moving_last_stop() {
        let mut record = task(600);
        assert!(record.start());
        for _ in 0..5 {
            record.tick(Weekday::Mon);
        }

        assert_eq!(record.curr_time, 5);
        assert_eq!(record.last_stop, 0);
        assert_eq!(record.weekdays.monday, "0:00/0:10/0:00");

        assert!(record.pause(Weekday::Mon));
        assert_eq!(record.last_stop, 5);
    }

    #[test]
    fn planned_reached_fires_once() {
        let mut record = task(3);
        record.start();
        let reached = (0..5)
            .map(|_| record.tick(Weekday::Mon))
            .enumerate()
            .filter(|(_, outcome)| outcome.planned_reached)
            .map(|(index, _)| index + 1)
            .collect::<Vec<_>>();

        assert_eq!(reached, vec![3]);
        assert!(record.is_overtime());
    }

    #[test]
    fn redundant_transitions_are_no_ops() {
        let mut record = task(60);
        assert!(!record.pause(Weekday::Mon));

        record.start();
        assert!(!record.start());
        record.tick(Weekday::Mon);
        record.pause(Weekday::Mon);
        let once = record.clone();
        assert!(!record.pause(Weekday::Mon));
        assert_eq!(record, once);
    }

    #[test]
    fn stale_tick_after_pause_is_ignored() {
        let mut record = task(60);
        record.start();
        record.tick(Weekday::Mon);
        record.pause(Weekday::Mon);

        let outcome = record.tick(Weekday::Mon);
        assert!(!outcome.accumulated);
        assert_eq!(record.curr_time, 1);
    }

    #[test]
    fn round_up_applies_only_on_stop() {
        let mut record = task(3600);
        record.round_up_minutes = 5;
        record.curr_time = 189;
        record.start();
        record.tick(Weekday::Mon);
        assert_eq!(record.curr_time, 190);

        assert!(record.stop_with_round_up(Weekday::Mon));
        assert_eq!(record.curr_time, 300);
        assert_eq!(record.last_stop, 300);
        assert!(!record.running);
    }

    #[test]
    fn round_up_keeps_exact_multiples() {
        assert_eq!(round_up(300, 5), 300);
        assert_eq!(round_up(190, 5), 300);
        assert_eq!(round_up(0, 15), 0);
        assert_eq!(round_up(61, 0), 61);
        assert_eq!(round_up(3601, 60), 7200);
    }

    #[test]
    fn restart_keeps_a_running_timer_running() {
        let mut record = task(60);
        record.start();
        record.tick(Weekday::Mon);
        record.restart(Weekday::Mon);
        assert!(record.running);
        assert_eq!(record.curr_time, 0);

        record.pause(Weekday::Mon);
        record.curr_time = 30;
        record.last_stop = 30;
        record.restart(Weekday::Mon);
        assert!(!record.running);
        assert_eq!(record.curr_time, 0);
        assert_eq!(record.last_stop, 0);
    }

    #[test]
    fn catch_up_credits_the_gap_since_the_stamp() {
        let mut record = task(1800);
        record.start();
        record.curr_time = 100;
        record.date_time = Some(at("2024-01-01 10:00:00"));

        let outcome = record.catch_up(at("2024-01-01 10:30:00"));
        assert!(outcome.accumulated);
        assert!(outcome.planned_reached);
        assert_eq!(record.curr_time, 1900);
        assert_eq!(record.date_time, Some(at("2024-01-01 10:30:00")));
        assert_eq!(record.weekdays.monday, "0:31/0:30/0:00");
    }

    #[test]
    fn catch_up_ignores_stopped_timers_and_old_stamps() {
        let mut stopped = task(600);
        stopped.curr_time = 10;
        stopped.date_time = Some(at("2024-01-01 10:00:00"));
        assert!(!stopped.catch_up(at("2024-01-01 11:00:00")).accumulated);
        assert_eq!(stopped.curr_time, 10);

        let mut stale = task(600);
        stale.start();
        stale.date_time = Some(at("2023-12-31 23:00:00"));
        assert!(!stale.catch_up(at("2024-01-01 01:00:00")).accumulated);

        let mut ahead = task(600);
        ahead.start();
        ahead.date_time = Some(at("2024-01-01 12:00:00"));
        assert!(!ahead.catch_up(at("2024-01-01 11:00:00")).accumulated);
        assert_eq!(ahead.curr_time, 0);
    }
}
