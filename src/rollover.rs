use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, warn};

use crate::domain::{Envelope, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloverOutcome {
    /// `last_date` already is today.
    SameDay,
    NewDay {
        archived: bool,
        previous: Option<NaiveDate>,
    },
}

/// Brings a persisted envelope up to `today`.
///
/// The previous day's list is archived under its date (never overwriting an
/// existing snapshot), then every task is reset for the new day: timers lose
/// today's time and stop, checklists are unchecked. Only today's weekday slot
/// of each ledger is rewritten; the other six keep their figures until their
/// own weekday comes around. Running it twice for the same day is a no-op.
pub fn reconcile(envelope: &mut Envelope, today: NaiveDate) -> RolloverOutcome {
    if envelope.last_date == Some(today) {
        return RolloverOutcome::SameDay;
    }

    let previous = envelope.last_date;
    if let Some(previous) = previous {
        if previous > today {
            warn!(%previous, %today, "saved date is in the future, rolling over anyway");
        }
    }

    let archived = archive(envelope);
    let weekday = today.weekday();
    for task in &mut envelope.tasks {
        match task {
            Task::Timer(record) => {
                record.curr_time = 0;
                record.last_stop = 0;
                record.running = false;
                record.sync_ledger(weekday);
            }
            Task::Checklist(record) => record.uncheck_all(),
        }
    }
    envelope.last_date = Some(today);

    info!(
        ?previous,
        %today,
        archived,
        tasks = envelope.tasks.len(),
        "rolled over to a new day"
    );
    RolloverOutcome::NewDay { archived, previous }
}

fn archive(envelope: &mut Envelope) -> bool {
    let Some(previous) = envelope.last_date else {
        return false;
    };
    if envelope.tasks.is_empty() {
        return false;
    }
    if envelope.task_history.contains_key(&previous) {
        debug!(%previous, "history already holds this day, keeping the existing snapshot");
        return false;
    }

    envelope
        .task_history
        .insert(previous, envelope.tasks.clone());
    true
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{RolloverOutcome, reconcile};
    use crate::domain::{ChecklistRecord, Envelope, Task, TaskRecord};

    fn day(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid date")
    }

    fn envelope_with_progress() -> Envelope {
        let first = day("2024-01-01");
        let mut timer = TaskRecord::new(0, "Deep work".to_string(), 1200, "#111111".to_string(), first);
        timer.curr_time = 600;
        timer.last_stop = 600;
        timer.weekdays.update_day(chrono::Weekday::Mon, 600, 1200, 600);

        let mut checklist = ChecklistRecord::new(1, "Stretch".to_string(), 2, "#222222".to_string());
        checklist.checked = vec![true, true];

        Envelope {
            last_date: Some(first),
            tasks: vec![Task::Timer(timer), Task::Checklist(checklist)],
            ..Envelope::default()
        }
    }

    #[test]
    fn archives_and_resets_on_a_new_day() {
        let mut envelope = envelope_with_progress();
        let snapshot = envelope.tasks.clone();

        let outcome = reconcile(&mut envelope, day("2024-01-02"));
        assert_eq!(
            outcome,
            RolloverOutcome::NewDay {
                archived: true,
                previous: Some(day("2024-01-01")),
            }
        );

        assert_eq!(envelope.task_history.get(&day("2024-01-01")), Some(&snapshot));
        assert_eq!(envelope.last_date, Some(day("2024-01-02")));

        let Task::Timer(timer) = &envelope.tasks[0] else {
            panic!("expected a timer");
        };
        assert_eq!(timer.curr_time, 0);
        assert_eq!(timer.last_stop, 0);
        assert_eq!(timer.planned, 1200);
        // Tuesday gets a fresh slot, Monday keeps its history.
        assert_eq!(timer.weekdays.tuesday, "0:00/0:20/0:00");
        assert_eq!(timer.weekdays.monday, "0:10/0:20/0:10");

        let Task::Checklist(checklist) = &envelope.tasks[1] else {
            panic!("expected a checklist");
        };
        assert_eq!(checklist.checked, vec![false, false]);
    }

    #[test]
    fn same_day_is_left_alone() {
        let mut envelope = envelope_with_progress();
        let before = envelope.clone();
        assert_eq!(reconcile(&mut envelope, day("2024-01-01")), RolloverOutcome::SameDay);
        assert_eq!(envelope, before);
    }

    #[test]
    fn repeated_rollover_never_overwrites_history() {
        let mut envelope = envelope_with_progress();
        reconcile(&mut envelope, day("2024-01-02"));
        let history = envelope.task_history.clone();

        // Simulate a stale load carrying the old date again.
        envelope.last_date = Some(day("2024-01-01"));
        let outcome = reconcile(&mut envelope, day("2024-01-02"));
        assert!(matches!(outcome, RolloverOutcome::NewDay { archived: false, .. }));
        assert_eq!(envelope.task_history, history);
    }

    #[test]
    fn multi_day_gap_archives_only_the_last_saved_day() {
        let mut envelope = envelope_with_progress();
        reconcile(&mut envelope, day("2024-01-09"));
        assert_eq!(envelope.task_history.len(), 1);
        assert!(envelope.task_history.contains_key(&day("2024-01-01")));
    }

    #[test]
    fn empty_or_undated_envelopes_roll_over_without_archiving() {
        let mut empty = Envelope {
            last_date: Some(day("2024-01-01")),
            ..Envelope::default()
        };
        let outcome = reconcile(&mut empty, day("2024-01-02"));
        assert!(matches!(outcome, RolloverOutcome::NewDay { archived: false, .. }));
        assert!(empty.task_history.is_empty());

        let mut undated = envelope_with_progress();
        undated.last_date = None;
        reconcile(&mut undated, day("2024-01-02"));
        assert!(undated.task_history.is_empty());
        assert_eq!(undated.last_date, Some(day("2024-01-02")));
    }
}
