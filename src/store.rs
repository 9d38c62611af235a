use std::collections::{BTreeMap, VecDeque};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate, Weekday};
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::domain::{
    ChecklistRecord, DEFAULT_DESCRIPTION, Envelope, ROUND_UP_CHOICES, SECONDS_OF_DAY, Task, TaskId,
    TaskRecord, is_hex_color, random_color,
};
use crate::engine::TickOutcome;
use crate::rollover::{RolloverOutcome, reconcile};
use crate::storage::{StorageError, load_envelope, save_envelope};
use crate::time_format::format_clock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    TaskNotFound(TaskId),
    EmptyName,
    PlannedTooLong { requested: u64, remaining: u64 },
    InvalidBoxCount(usize),
    InvalidCheckIndex { id: TaskId, index: usize, count: usize },
    InvalidColor(String),
    InvalidRoundUp(u32),
    NotATimer(TaskId),
    NotAChecklist(TaskId),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::TaskNotFound(id) => write!(f, "task not found: {id}"),
            StoreError::EmptyName => write!(f, "task name must not be empty"),
            StoreError::PlannedTooLong {
                requested,
                remaining,
            } => write!(
                f,
                "planned time {} exceeds the {} left in the day",
                format_clock(*requested),
                format_clock(*remaining)
            ),
            StoreError::InvalidBoxCount(count) => {
                write!(f, "a checklist needs at least one box, got {count}")
            }
            StoreError::InvalidCheckIndex { id, index, count } => {
                write!(f, "checklist {id} has {count} boxes, no box {index}")
            }
            StoreError::InvalidColor(color) => write!(f, "not a hex color: {color}"),
            StoreError::InvalidRoundUp(minutes) => write!(
                f,
                "round-up must be one of {ROUND_UP_CHOICES:?} minutes, got {minutes}"
            ),
            StoreError::NotATimer(id) => write!(f, "task {id} is a checklist, not a timer"),
            StoreError::NotAChecklist(id) => write!(f, "task {id} is a timer, not a checklist"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Combined time of all timer tasks, shown in the panel indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Totals {
    pub current: u64,
    pub planned: u64,
}

impl Display for Totals {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} / {}",
            format_clock(self.current),
            format_clock(self.planned)
        )
    }
}

/// Notifications for the host to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    PlannedReached {
        id: TaskId,
        name: String,
        planned: String,
    },
    TotalsChanged(Totals),
    ListChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Owner of the task list.
///
/// Hosts read through the accessors and change state only through the
/// operations below, which keep at most one timer running. Outbound
/// notifications queue up until [`drain_events`](Self::drain_events).
#[derive(Debug)]
pub struct TaskStore<C: Clock = SystemClock> {
    envelope: Envelope,
    next_id: TaskId,
    default_round_up: u32,
    events: VecDeque<StoreEvent>,
    clock: C,
}

impl TaskStore<SystemClock> {
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        Self::load_with_clock(path, SystemClock)
    }
}

impl<C: Clock> TaskStore<C> {
    pub fn load_with_clock(path: &Path, clock: C) -> Result<Self, StorageError> {
        let envelope = load_envelope(path)?;
        debug!(path = %path.display(), tasks = envelope.tasks.len(), "loaded save file");
        Ok(Self::new(envelope, clock))
    }

    /// Reconciles a persisted envelope with today before handing it out.
    ///
    /// On the same day, a timer saved as running is credited with the wall
    /// time that passed since its last stamp.
    pub fn new(mut envelope: Envelope, clock: C) -> Self {
        let rollover = reconcile(&mut envelope, clock.today());

        let reassigned = envelope.dedupe_ids();
        if reassigned > 0 {
            info!(reassigned, "assigned fresh ids to tasks sharing an id");
        }

        let now = clock.now();
        let mut events = VecDeque::new();
        let mut kept_running = false;
        for task in &mut envelope.tasks {
            if let Task::Timer(record) = task {
                if record.running && kept_running {
                    warn!(id = record.id, name = %record.name, "several timers were saved running, stopping this one");
                    record.pause(now.weekday());
                } else if rollover == RolloverOutcome::SameDay {
                    let before = record.curr_time;
                    let outcome = record.catch_up(now);
                    if outcome.accumulated {
                        info!(id = record.id, seconds = record.curr_time - before, "credited time that passed while not ticking");
                    }
                    if outcome.planned_reached {
                        events.push_back(planned_reached(record));
                    }
                }
                kept_running |= record.running;
            }
        }

        let next_id = envelope.next_id();
        Self {
            envelope,
            next_id,
            default_round_up: 0,
            events,
            clock,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        save_envelope(path, &self.envelope)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn tasks(&self) -> &[Task] {
        &self.envelope.tasks
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.envelope.tasks.iter().find(|task| task.id() == id)
    }

    pub fn history(&self) -> &BTreeMap<NaiveDate, Vec<Task>> {
        &self.envelope.task_history
    }

    pub fn running_task(&self) -> Option<&TaskRecord> {
        self.envelope
            .tasks
            .iter()
            .filter_map(Task::as_timer)
            .find(|record| record.running)
    }

    pub fn totals(&self) -> Totals {
        self.envelope
            .tasks
            .iter()
            .filter_map(Task::as_timer)
            .fold(Totals::default(), |totals, record| Totals {
                current: totals.current.saturating_add(record.curr_time),
                planned: totals.planned.saturating_add(record.planned),
            })
    }

    /// Planned time that can still be handed out today.
    pub fn remaining_capacity(&self) -> u64 {
        SECONDS_OF_DAY.saturating_sub(self.totals().planned)
    }

    /// Round-up step given to newly created timers.
    pub fn set_default_round_up(&mut self, minutes: u32) -> Result<(), StoreError> {
        validate_round_up(minutes)?;
        self.default_round_up = minutes;
        Ok(())
    }

    pub fn drain_events(&mut self) -> Vec<StoreEvent> {
        self.events.drain(..).collect()
    }

    pub fn create_task(&mut self, name: &str, planned: u64) -> Result<TaskId, StoreError> {
        let name = validate_name(name)?;
        self.check_day();
        let remaining = self.remaining_capacity();
        if planned > remaining {
            return Err(StoreError::PlannedTooLong {
                requested: planned,
                remaining,
            });
        }

        let id = self.allocate_id();
        let mut record = TaskRecord::new(id, name, planned, random_color(), self.clock.today());
        record.round_up_minutes = self.default_round_up;
        info!(id, name = %record.name, planned, "created timer task");
        self.envelope.tasks.push(Task::Timer(record));
        self.list_changed();
        Ok(id)
    }

    pub fn create_checklist(&mut self, name: &str, boxes: usize) -> Result<TaskId, StoreError> {
        let name = validate_name(name)?;
        if boxes == 0 {
            return Err(StoreError::InvalidBoxCount(boxes));
        }
        self.check_day();

        let id = self.allocate_id();
        info!(id, name = %name, boxes, "created checklist");
        self.envelope
            .tasks
            .push(Task::Checklist(ChecklistRecord::new(id, name, boxes, random_color())));
        self.events.push_back(StoreEvent::ListChanged);
        Ok(id)
    }

    /// Starts a timer, stopping whichever other timer was running.
    pub fn start(&mut self, id: TaskId) -> Result<bool, StoreError> {
        self.check_day();
        if self.timer(id)?.running {
            return Ok(false);
        }

        let weekday = self.weekday();
        for task in &mut self.envelope.tasks {
            if let Task::Timer(record) = task {
                if record.id != id && record.pause(weekday) {
                    info!(id = record.id, name = %record.name, "stopped to keep a single timer running");
                }
            }
        }

        let now = self.clock.now();
        let record = self.timer_mut(id)?;
        let started = record.start();
        record.date_time = Some(now);
        self.totals_changed();
        Ok(started)
    }

    pub fn pause(&mut self, id: TaskId) -> Result<bool, StoreError> {
        self.check_day();
        let weekday = self.weekday();
        let paused = self.timer_mut(id)?.pause(weekday);
        if paused {
            self.totals_changed();
        }
        Ok(paused)
    }

    pub fn stop_with_round_up(&mut self, id: TaskId) -> Result<bool, StoreError> {
        self.check_day();
        let weekday = self.weekday();
        let stopped = self.timer_mut(id)?.stop_with_round_up(weekday);
        if stopped {
            self.totals_changed();
        }
        Ok(stopped)
    }

    pub fn restart(&mut self, id: TaskId) -> Result<(), StoreError> {
        self.check_day();
        let now = self.clock.now();
        let record = self.timer_mut(id)?;
        record.restart(now.weekday());
        if record.running {
            record.date_time = Some(now);
        }
        self.totals_changed();
        Ok(())
    }

    /// One second of the shared scheduler: advances every running timer.
    pub fn tick(&mut self) {
        if self.check_day() {
            return;
        }

        let now = self.clock.now();
        let mut accumulated = false;
        let mut reached = Vec::new();
        for task in &mut self.envelope.tasks {
            if let Task::Timer(record) = task {
                let outcome = record.tick(now.weekday());
                if outcome.accumulated {
                    record.date_time = Some(now);
                }
                accumulated |= outcome.accumulated;
                if outcome.planned_reached {
                    reached.push(planned_reached(record));
                }
            }
        }

        self.events.extend(reached);
        if accumulated {
            self.totals_changed();
        }
    }

    /// One second for a single timer, for hosts that schedule per task.
    pub fn tick_task(&mut self, id: TaskId) -> Result<TickOutcome, StoreError> {
        if self.check_day() {
            self.timer(id)?;
            return Ok(TickOutcome::default());
        }

        let now = self.clock.now();
        let record = self.timer_mut(id)?;
        let outcome = record.tick(now.weekday());
        if outcome.accumulated {
            record.date_time = Some(now);
        }
        let reached = outcome.planned_reached.then(|| planned_reached(record));

        self.events.extend(reached);
        if outcome.accumulated {
            self.totals_changed();
        }
        Ok(outcome)
    }

    /// Flips one box and returns its new state.
    pub fn toggle_checkbox(&mut self, id: TaskId, index: usize) -> Result<bool, StoreError> {
        self.check_day();
        let record = match self.find_mut(id)? {
            Task::Checklist(record) => record,
            Task::Timer(_) => return Err(StoreError::NotAChecklist(id)),
        };

        let count = record.checked.len();
        let checked = record
            .checked
            .get_mut(index)
            .ok_or(StoreError::InvalidCheckIndex { id, index, count })?;
        *checked = !*checked;
        let checked = *checked;
        self.events.push_back(StoreEvent::ListChanged);
        Ok(checked)
    }

    pub fn delete_task(&mut self, id: TaskId) -> Result<Task, StoreError> {
        self.check_day();
        let index = self.position(id)?;
        let task = self.envelope.tasks.remove(index);
        info!(id, name = task.name(), "deleted task");
        self.list_changed();
        Ok(task)
    }

    /// Swaps a task with its neighbour. Ids stay with their tasks.
    pub fn move_task(&mut self, id: TaskId, direction: Direction) -> Result<bool, StoreError> {
        self.check_day();
        let index = self.position(id)?;
        let target = match direction {
            Direction::Up => index.checked_sub(1),
            Direction::Down => Some(index + 1).filter(|target| *target < self.envelope.tasks.len()),
        };

        let Some(target) = target else {
            return Ok(false);
        };
        self.envelope.tasks.swap(index, target);
        self.events.push_back(StoreEvent::ListChanged);
        Ok(true)
    }

    pub fn set_color(&mut self, id: TaskId, color: &str) -> Result<(), StoreError> {
        let color = color.trim();
        if !is_hex_color(color) {
            return Err(StoreError::InvalidColor(color.to_string()));
        }
        self.check_day();
        self.find_mut(id)?.set_color(color.to_string());
        self.events.push_back(StoreEvent::ListChanged);
        Ok(())
    }

    pub fn set_description(&mut self, id: TaskId, text: &str) -> Result<(), StoreError> {
        let text = text.trim();
        let description = if text.is_empty() {
            DEFAULT_DESCRIPTION
        } else {
            text
        };
        self.check_day();
        self.find_mut(id)?.set_description(description.to_string());
        self.events.push_back(StoreEvent::ListChanged);
        Ok(())
    }

    pub fn set_round_up(&mut self, id: TaskId, minutes: u32) -> Result<(), StoreError> {
        validate_round_up(minutes)?;
        self.check_day();
        self.timer_mut(id)?.round_up_minutes = minutes;
        self.events.push_back(StoreEvent::ListChanged);
        Ok(())
    }

    pub fn set_link(&mut self, id: TaskId, url: Option<&str>) -> Result<(), StoreError> {
        let link = url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string);
        self.check_day();
        self.timer_mut(id)?.link = link;
        self.events.push_back(StoreEvent::ListChanged);
        Ok(())
    }

    pub fn set_planned(&mut self, id: TaskId, seconds: u64) -> Result<(), StoreError> {
        self.check_day();
        let own = self.timer(id)?.planned;
        let remaining = self.remaining_capacity().saturating_add(own);
        if seconds > remaining {
            return Err(StoreError::PlannedTooLong {
                requested: seconds,
                remaining,
            });
        }

        let weekday = self.weekday();
        let record = self.timer_mut(id)?;
        record.planned = seconds;
        record.sync_ledger(weekday);
        self.totals_changed();
        Ok(())
    }

    /// Corrects today's accumulated time by hand.
    pub fn set_current_time(&mut self, id: TaskId, seconds: u64) -> Result<(), StoreError> {
        self.check_day();
        let weekday = self.weekday();
        let record = self.timer_mut(id)?;
        record.curr_time = seconds;
        if !record.running {
            record.last_stop = seconds;
        }
        record.sync_ledger(weekday);
        self.totals_changed();
        Ok(())
    }

    /// Runs the day rollover if the calendar moved on since the last check.
    pub fn check_day(&mut self) -> bool {
        match reconcile(&mut self.envelope, self.clock.today()) {
            RolloverOutcome::SameDay => false,
            RolloverOutcome::NewDay { .. } => {
                self.list_changed();
                true
            }
        }
    }

    fn weekday(&self) -> Weekday {
        self.clock.today().weekday()
    }

    fn allocate_id(&mut self) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn position(&self, id: TaskId) -> Result<usize, StoreError> {
        self.envelope
            .tasks
            .iter()
            .position(|task| task.id() == id)
            .ok_or(StoreError::TaskNotFound(id))
    }

    fn find_mut(&mut self, id: TaskId) -> Result<&mut Task, StoreError> {
        self.envelope
            .tasks
            .iter_mut()
            .find(|task| task.id() == id)
            .ok_or(StoreError::TaskNotFound(id))
    }

    fn timer(&self, id: TaskId) -> Result<&TaskRecord, StoreError> {
        match self.task(id) {
            Some(Task::Timer(record)) => Ok(record),
            Some(Task::Checklist(_)) => Err(StoreError::NotATimer(id)),
            None => Err(StoreError::TaskNotFound(id)),
        }
    }

    fn timer_mut(&mut self, id: TaskId) -> Result<&mut TaskRecord, StoreError> {
        match self.find_mut(id)? {
            Task::Timer(record) => Ok(record),
            Task::Checklist(_) => Err(StoreError::NotATimer(id)),
        }
    }

    fn totals_changed(&mut self) {
        let totals = self.totals();
        self.events.push_back(StoreEvent::TotalsChanged(totals));
    }

    fn list_changed(&mut self) {
        self.events.push_back(StoreEvent::ListChanged);
        self.totals_changed();
    }
}

/// Saves the store every `interval` ticks.
///
/// A failed save is logged and left for the next cycle.
#[derive(Debug)]
pub struct Autosave {
    path: PathBuf,
    interval: u64,
    elapsed: u64,
}

impl Autosave {
    pub fn new(path: PathBuf, interval_secs: u64) -> Self {
        Self {
            path,
            interval: interval_secs.max(1),
            elapsed: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Counts one second; returns whether a save was attempted.
    pub fn tick<C: Clock>(&mut self, store: &TaskStore<C>) -> bool {
        self.elapsed += 1;
        if self.elapsed < self.interval {
            return false;
        }

        self.elapsed = 0;
        if let Err(err) = store.save(&self.path) {
            error!(path = %self.path.display(), "autosave failed: {err}");
        }
        true
    }

    pub fn flush<C: Clock>(&mut self, store: &TaskStore<C>) -> Result<(), StorageError> {
        self.elapsed = 0;
        store.save(&self.path)
    }
}

fn planned_reached(record: &TaskRecord) -> StoreEvent {
    info!(id = record.id, name = %record.name, "planned time reached");
    StoreEvent::PlannedReached {
        id: record.id,
        name: record.name.clone(),
        planned: format_clock(record.planned),
    }
}

fn validate_name(name: &str) -> Result<String, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::EmptyName);
    }
    Ok(name.to_string())
}

fn validate_round_up(minutes: u32) -> Result<(), StoreError> {
    if ROUND_UP_CHOICES.contains(&minutes) {
        Ok(())
    } else {
        Err(StoreError::InvalidRoundUp(minutes))
    }
}
