use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::time_format::{format_clock, parse_clock};

const EMPTY_SLOT: &str = "0:00/0:00/0:00";

/// Rolling seven-day record of a timer task.
///
/// Each slot holds `current/planned/lastStop`, every component rendered with
/// [`format_clock`]. A slot keeps last week's figures until the same weekday
/// comes around again and overwrites it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklyLedger {
    pub sunday: String,
    pub monday: String,
    pub tuesday: String,
    pub wednesday: String,
    pub thursday: String,
    pub friday: String,
    pub saturday: String,
}

impl Default for WeeklyLedger {
    fn default() -> Self {
        Self {
            sunday: EMPTY_SLOT.to_string(),
            monday: EMPTY_SLOT.to_string(),
            tuesday: EMPTY_SLOT.to_string(),
            wednesday: EMPTY_SLOT.to_string(),
            thursday: EMPTY_SLOT.to_string(),
            friday: EMPTY_SLOT.to_string(),
            saturday: EMPTY_SLOT.to_string(),
        }
    }
}

/// Parsed view of one ledger slot, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayTimes {
    pub current: u64,
    pub planned: u64,
    /// Absent in two-part slots written by older versions.
    pub last_stop: Option<u64>,
}

impl WeeklyLedger {
    pub fn slot(&self, weekday: Weekday) -> &str {
        match weekday {
            Weekday::Sun => &self.sunday,
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
        }
    }

    fn slot_mut(&mut self, weekday: Weekday) -> &mut String {
        match weekday {
            Weekday::Sun => &mut self.sunday,
            Weekday::Mon => &mut self.monday,
            Weekday::Tue => &mut self.tuesday,
            Weekday::Wed => &mut self.wednesday,
            Weekday::Thu => &mut self.thursday,
            Weekday::Fri => &mut self.friday,
            Weekday::Sat => &mut self.saturday,
        }
    }

    /// Overwrites the slot for `weekday`; every other slot is left alone.
    pub fn update_day(&mut self, weekday: Weekday, current: u64, planned: u64, last_stop: u64) {
        *self.slot_mut(weekday) = format!(
            "{}/{}/{}",
            format_clock(current),
            format_clock(planned),
            format_clock(last_stop)
        );
    }

    pub fn day(&self, weekday: Weekday) -> DayTimes {
        parse_slot(self.slot(weekday))
    }

    /// Slots in Sunday-first order, matching [`weekday_from_index`].
    pub fn days(&self) -> [(Weekday, DayTimes); 7] {
        WEEK.map(|weekday| (weekday, self.day(weekday)))
    }

    /// Sums of the current and planned components over all seven slots.
    pub fn totals(&self) -> (u64, u64) {
        self.days()
            .iter()
            .fold((0, 0), |(current, planned), (_, day)| {
                (
                    current.saturating_add(day.current),
                    planned.saturating_add(day.planned),
                )
            })
    }

    /// Two-line weekly summary: current total, then planned total.
    pub fn aggregate_total(&self) -> String {
        let (current, planned) = self.totals();
        format!("{}\n{}", format_clock(current), format_clock(planned))
    }
}

const WEEK: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

/// Maps `0 = Sunday .. 6 = Saturday` onto a weekday.
pub fn weekday_from_index(index: u32) -> Option<Weekday> {
    WEEK.get(index as usize).copied()
}

fn parse_slot(slot: &str) -> DayTimes {
    let mut parts = slot.split('/');
    let current = parts.next().map(parse_clock).unwrap_or(0);
    let planned = parts.next().map(parse_clock).unwrap_or(0);
    let last_stop = parts.next().map(parse_clock);
    DayTimes {
        current,
        planned,
        last_stop,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Weekday;

    use super::{WeeklyLedger, weekday_from_index};

    #[test]
    fn update_touches_only_one_slot() {
        let mut ledger = WeeklyLedger::default();
        ledger.update_day(Weekday::Wed, 3900, 7200, 1800);

        assert_eq!(ledger.wednesday, "1:05/2:00/0:30");
        assert_eq!(ledger.tuesday, "0:00/0:00/0:00");
        assert_eq!(ledger.saturday, "0:00/0:00/0:00");
    }

    #[test]
    fn aggregates_current_and_planned_separately() {
        let mut ledger = WeeklyLedger::default();
        ledger.update_day(Weekday::Mon, 1800, 3600, 1800);
        ledger.update_day(Weekday::Sat, 5400, 3600, 0);

        assert_eq!(ledger.aggregate_total(), "2:00\n2:00");
    }

    #[test]
    fn tolerates_two_part_slots() {
        let ledger = WeeklyLedger {
            friday: "1:30/2:00".to_string(),
            ..WeeklyLedger::default()
        };

        let friday = ledger.day(Weekday::Fri);
        assert_eq!(friday.current, 5400);
        assert_eq!(friday.planned, 7200);
        assert_eq!(friday.last_stop, None);
        assert_eq!(ledger.aggregate_total(), "1:30\n2:00");
    }

    #[test]
    fn oversized_slots_saturate_the_totals() {
        let ledger = WeeklyLedger {
            monday: "99999999999999999:00/1:00".to_string(),
            tuesday: "99999999999999999:00/1:00".to_string(),
            ..WeeklyLedger::default()
        };

        assert_eq!(ledger.totals(), (u64::MAX, 7200));
    }

    #[test]
    fn missing_slots_deserialize_as_empty() {
        let ledger: WeeklyLedger =
            serde_json::from_str(r#"{"monday":"0:10/0:20"}"#).expect("ledger should parse");
        assert_eq!(ledger.monday, "0:10/0:20");
        assert_eq!(ledger.sunday, "0:00/0:00/0:00");
    }

    #[test]
    fn weekday_index_is_sunday_first() {
        assert_eq!(weekday_from_index(0), Some(Weekday::Sun));
        assert_eq!(weekday_from_index(6), Some(Weekday::Sat));
        assert_eq!(weekday_from_index(7), None);
    }
}
