use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime};
use rand::{Rng, thread_rng};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::weekly::WeeklyLedger;

pub type TaskId = u64;

pub const DEFAULT_DESCRIPTION: &str = "Enter description here!";
pub const SECONDS_OF_DAY: u64 = 86_400;
pub const ROUND_UP_CHOICES: [u32; 6] = [0, 5, 10, 15, 30, 60];

pub const PALETTE: [&str; 11] = [
    "#4CAF50", "#2196F3", "#9C27B0", "#F44336", "#FF9800", "#607D8B", "#00BCD4", "#8BC34A",
    "#FFC107", "#E91E63", "#795548",
];

/// A task that tracks time against a planned daily duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    #[serde(default)]
    pub id: TaskId,
    pub name: String,
    #[serde(alias = "time")]
    pub planned: u64,
    #[serde(default)]
    pub curr_time: u64,
    #[serde(default)]
    pub last_stop: u64,
    #[serde(default)]
    pub running: bool,
    #[serde(default = "random_color")]
    pub color: String,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default)]
    pub round_up_minutes: u32,
    #[serde(default)]
    pub weekdays: WeeklyLedger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<NaiveDate>,
    /// Local wall time of the last start or tick.
    #[serde(
        default,
        deserialize_with = "tolerant_stamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub date_time: Option<NaiveDateTime>,
}

impl TaskRecord {
    pub fn new(id: TaskId, name: String, planned: u64, color: String, today: NaiveDate) -> Self {
        let mut weekdays = WeeklyLedger::default();
        weekdays.update_day(today.weekday(), 0, planned, 0);
        Self {
            id,
            name,
            planned,
            curr_time: 0,
            last_stop: 0,
            running: false,
            color,
            description: DEFAULT_DESCRIPTION.to_string(),
            round_up_minutes: 0,
            weekdays,
            link: None,
            created_on: Some(today),
            date_time: None,
        }
    }

    /// Derived display flag; nothing extra is stored for it.
    pub fn is_overtime(&self) -> bool {
        self.curr_time > self.planned
    }

    /// Progress towards the planned duration, capped at 1.0.
    pub fn progress(&self) -> f64 {
        if self.planned == 0 {
            return 1.0;
        }
        (self.curr_time as f64 / self.planned as f64).min(1.0)
    }
}

/// A row of checkboxes without any time tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistRecord {
    #[serde(default)]
    pub id: TaskId,
    pub name: String,
    #[serde(default = "random_color")]
    pub color: String,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default)]
    pub check_count: usize,
    #[serde(default)]
    pub checked: Vec<bool>,
}

impl ChecklistRecord {
    pub fn new(id: TaskId, name: String, check_count: usize, color: String) -> Self {
        Self {
            id,
            name,
            color,
            description: DEFAULT_DESCRIPTION.to_string(),
            check_count,
            checked: vec![false; check_count],
        }
    }

    pub fn completed(&self) -> usize {
        self.checked.iter().filter(|checked| **checked).count()
    }

    pub fn uncheck_all(&mut self) {
        self.checked.iter_mut().for_each(|checked| *checked = false);
    }

    /// Reconciles `checked` with `check_count`. Older files sometimes carry
    /// only one of the two, or a shorter list than the box count.
    fn normalize(&mut self) -> Result<(), String> {
        if self.check_count == 0 {
            self.check_count = self.checked.len();
        }
        if self.check_count == 0 {
            return Err(format!("checklist {:?} has no boxes", self.name));
        }
        self.checked.resize(self.check_count, false);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Timer(TaskRecord),
    Checklist(ChecklistRecord),
}

impl Task {
    pub fn id(&self) -> TaskId {
        match self {
            Task::Timer(record) => record.id,
            Task::Checklist(record) => record.id,
        }
    }

    pub(crate) fn set_id(&mut self, id: TaskId) {
        match self {
            Task::Timer(record) => record.id = id,
            Task::Checklist(record) => record.id = id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Task::Timer(record) => &record.name,
            Task::Checklist(record) => &record.name,
        }
    }

    pub fn color(&self) -> &str {
        match self {
            Task::Timer(record) => &record.color,
            Task::Checklist(record) => &record.color,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Task::Timer(record) => &record.description,
            Task::Checklist(record) => &record.description,
        }
    }

    pub(crate) fn set_color(&mut self, color: String) {
        match self {
            Task::Timer(record) => record.color = color,
            Task::Checklist(record) => record.color = color,
        }
    }

    pub(crate) fn set_description(&mut self, description: String) {
        match self {
            Task::Timer(record) => record.description = description,
            Task::Checklist(record) => record.description = description,
        }
    }

    pub fn as_timer(&self) -> Option<&TaskRecord> {
        match self {
            Task::Timer(record) => Some(record),
            Task::Checklist(_) => None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Task::Timer(record) if record.running)
    }

    /// Decodes one persisted record, telling the two variants apart by the
    /// `isCheckbox` flag.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let is_checkbox = value
            .get("isCheckbox")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if is_checkbox {
            let mut record: ChecklistRecord = serde_json::from_value(value)?;
            record.normalize().map_err(de::Error::custom)?;
            Ok(Task::Checklist(record))
        } else {
            Ok(Task::Timer(serde_json::from_value(value)?))
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChecklistWire<'a> {
    is_checkbox: bool,
    #[serde(flatten)]
    record: &'a ChecklistRecord,
}

impl Serialize for Task {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Task::Timer(record) => record.serialize(serializer),
            Task::Checklist(record) => ChecklistWire {
                is_checkbox: true,
                record,
            }
            .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Task {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Task::from_value(value).map_err(de::Error::custom)
    }
}

/// Everything that is persisted between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_date: Option<NaiveDate>,
    pub tasks: Vec<Task>,
    /// One frozen snapshot per finished day, keyed by that day.
    pub task_history: BTreeMap<NaiveDate, Vec<Task>>,
}

impl Envelope {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            last_date: Some(today),
            ..Self::default()
        }
    }

    /// Day of the most recent stamp on any timer.
    pub fn latest_activity(&self) -> Option<NaiveDate> {
        self.tasks
            .iter()
            .filter_map(Task::as_timer)
            .filter_map(|record| record.date_time)
            .max()
            .map(|stamp| stamp.date())
    }

    /// Smallest id above every id in use.
    pub fn next_id(&self) -> TaskId {
        self.tasks
            .iter()
            .map(|task| task.id() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Gives every task that shares an id with an earlier task a fresh one.
    /// Ids that are already unique never change.
    pub fn dedupe_ids(&mut self) -> usize {
        let mut next = self.next_id();
        let mut seen = HashSet::new();
        let mut reassigned = 0;
        for task in &mut self.tasks {
            if !seen.insert(task.id()) {
                task.set_id(next);
                seen.insert(next);
                next += 1;
                reassigned += 1;
            }
        }
        reassigned
    }
}

pub fn random_color() -> String {
    let mut rng = thread_rng();
    let red: u8 = rng.r#gen();
    let green: u8 = rng.r#gen();
    let blue: u8 = rng.r#gen();
    format!("#{red:02x}{green:02x}{blue:02x}")
}

/// Accepts `#rgb` and `#rrggbb`.
pub fn is_hex_color(color: &str) -> bool {
    let Some(digits) = color.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 6) && digits.bytes().all(|byte| byte.is_ascii_hexdigit())
}

fn default_description() -> String {
    DEFAULT_DESCRIPTION.to_string()
}

/// Older files hold a UTC timestamp with an offset; newer ones local wall
/// time. Anything else is dropped rather than failing the record.
fn tolerant_stamp<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(parse_stamp))
}

fn parse_stamp(raw: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(raw)
        .map(|stamp| stamp.with_timezone(&Local).naive_local())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok())
}
