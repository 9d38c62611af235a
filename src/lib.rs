//! Task timer core: tasks with planned daily durations, tick-driven time
//! accounting, a rolling weekly ledger per task, checklist rows, and the
//! day rollover that archives yesterday into history.

pub mod clock;
pub mod config;
pub mod domain;
pub mod engine;
pub mod paths;
pub mod rollover;
pub mod storage;
pub mod store;
pub mod time_format;
pub mod weekly;

pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::{ChecklistRecord, Envelope, Task, TaskId, TaskRecord};
pub use store::{Autosave, Direction, StoreError, StoreEvent, TaskStore, Totals};
