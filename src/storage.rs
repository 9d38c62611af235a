use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::domain::{Envelope, Task};

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    JsonDecode(serde_json::Error),
    JsonEncode(serde_json::Error),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "io error: {err}"),
            StorageError::JsonDecode(err) => write!(f, "failed to parse save file: {err}"),
            StorageError::JsonEncode(err) => write!(f, "failed to encode save file: {err}"),
        }
    }
}

impl std::error::Error for StorageError {}

pub fn serialize(envelope: &Envelope) -> Result<String, StorageError> {
    serde_json::to_string_pretty(envelope).map_err(StorageError::JsonEncode)
}

/// Parses a save file.
///
/// Besides the current `{lastDate, tasks, taskHistory}` envelope this accepts
/// a bare task list and the oldest id-keyed object map. Records that fail to
/// decode are dropped one by one; only text that is not JSON at all is an
/// error. Files without a `lastDate` take the day of the newest task stamp.
pub fn deserialize(text: &str) -> Result<Envelope, StorageError> {
    if text.trim().is_empty() {
        return Ok(Envelope::default());
    }

    let value: Value = serde_json::from_str(text).map_err(StorageError::JsonDecode)?;
    let mut envelope = match value {
        Value::Array(items) => Envelope {
            tasks: decode_tasks(items),
            ..Envelope::default()
        },
        Value::Object(mut fields) if fields.contains_key("tasks") => Envelope {
            last_date: fields.remove("lastDate").and_then(decode_date),
            tasks: match fields.remove("tasks") {
                Some(Value::Array(items)) => decode_tasks(items),
                _ => Vec::new(),
            },
            task_history: match fields.remove("taskHistory") {
                Some(Value::Object(days)) => decode_history(days),
                _ => BTreeMap::new(),
            },
        },
        Value::Object(legacy) => Envelope {
            tasks: decode_keyed_tasks(legacy),
            ..Envelope::default()
        },
        other => {
            warn!(kind = value_kind(&other), "save file holds no tasks, starting empty");
            Envelope::default()
        }
    };

    if envelope.last_date.is_none() {
        envelope.last_date = envelope.latest_activity();
        if let Some(day) = envelope.last_date {
            debug!(%day, "save file has no date, using the newest task stamp");
        }
    }
    Ok(envelope)
}

/// Like [`deserialize`], but an unreadable document yields an empty envelope.
pub fn deserialize_or_empty(text: &str) -> Envelope {
    deserialize(text).unwrap_or_else(|err| {
        warn!("{err}, starting with an empty task list");
        Envelope::default()
    })
}

/// Reads the save file.
///
/// A missing file is a fresh start. A corrupt one is renamed aside with a
/// timestamp suffix and replaced by an empty envelope. Only I/O failures are
/// returned.
pub fn load_envelope(path: &Path) -> Result<Envelope, StorageError> {
    let raw = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Envelope::default()),
        Err(err) if err.kind() == ErrorKind::InvalidData => {
            back_up_corrupt(path)?;
            return Ok(Envelope::default());
        }
        Err(err) => return Err(StorageError::Io(err)),
    };

    match deserialize(&raw) {
        Ok(envelope) => Ok(envelope),
        Err(err) => {
            error!(path = %path.display(), "{err}");
            back_up_corrupt(path)?;
            Ok(Envelope::default())
        }
    }
}

pub fn save_envelope(path: &Path, envelope: &Envelope) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(StorageError::Io)?;
        }
    }

    let body = serialize(envelope)?;
    let staging = sibling(path, ".tmp");
    let mut file = fs::File::create(&staging).map_err(StorageError::Io)?;
    file.write_all(body.as_bytes()).map_err(StorageError::Io)?;
    file.sync_all().map_err(StorageError::Io)?;
    fs::rename(&staging, path).map_err(StorageError::Io)?;
    Ok(())
}

fn back_up_corrupt(path: &Path) -> Result<PathBuf, StorageError> {
    let stamp = Local::now().format("%Y%m%dT%H%M%S");
    let backup = sibling(path, &format!(".corrupt-{stamp}"));
    fs::rename(path, &backup).map_err(StorageError::Io)?;
    warn!(
        path = %path.display(),
        backup = %backup.display(),
        "save file was unreadable, moved it aside"
    );
    Ok(backup)
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

fn decode_tasks(items: Vec<Value>) -> Vec<Task> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match Task::from_value(item) {
            Ok(task) => Some(task),
            Err(err) => {
                warn!(index, "dropping malformed task: {err}");
                None
            }
        })
        .collect()
}

fn decode_keyed_tasks(fields: Map<String, Value>) -> Vec<Task> {
    let mut keyed = fields
        .into_iter()
        .filter_map(|(key, value)| match key.parse::<u64>() {
            Ok(id) => Some((id, value)),
            Err(_) => {
                warn!(%key, "ignoring non-numeric task key");
                None
            }
        })
        .collect::<Vec<_>>();
    keyed.sort_by_key(|(id, _)| *id);

    if !keyed.is_empty() {
        info!(tasks = keyed.len(), "upgrading id-keyed save file");
    }

    keyed
        .into_iter()
        .filter_map(|(id, value)| match Task::from_value(value) {
            Ok(mut task) => {
                task.set_id(id);
                Some(task)
            }
            Err(err) => {
                warn!(id, "dropping malformed task: {err}");
                None
            }
        })
        .collect()
}

fn decode_history(days: Map<String, Value>) -> BTreeMap<NaiveDate, Vec<Task>> {
    days.into_iter()
        .filter_map(|(key, value)| {
            let Some(date) = decode_date(Value::String(key.clone())) else {
                warn!(%key, "ignoring history entry with an invalid date");
                return None;
            };
            let tasks = match value {
                Value::Array(items) => decode_tasks(items),
                _ => Vec::new(),
            };
            Some((date, tasks))
        })
        .collect()
}

fn decode_date(value: Value) -> Option<NaiveDate> {
    let raw = value.as_str()?;
    // Some versions stored a full ISO timestamp here.
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
